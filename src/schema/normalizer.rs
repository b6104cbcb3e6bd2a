//! Model normalization
//!
//! Raw models are loosely typed JSON: a bare type tag, a `{ type, ... }`
//! descriptor, a plain nested object, a single-key `{ <textTag>: child }`
//! dynamic map, or a single-element `[child]` list shorthand. They are
//! validated and converted into the canonical `ModelNode` tree exactly once,
//! when the schema is built.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};

use super::errors::{SchemaError, SchemaResult};
use super::types::{
    DynamicModel, KeyPath, ModelNode, NamedTransform, ObjectModel, PrimitiveKind, Transform,
    ValueSchema, VALUE_OPTIONS,
};

/// Node accessor names that can never be used as model field names
pub const RESERVED_NAMES: [&str; 4] = ["validate", "parent", "cast", "keyPath"];

/// Validates a raw model without building a schema.
///
/// `extra_method_names` are extension method names that are reserved in
/// addition to [`RESERVED_NAMES`]. Transform names in `get`/`set` are only
/// checked for being strings, since no transform registry is involved.
pub fn validate_model(
    model: &Value,
    extra_method_names: &[&str],
    key_path: &KeyPath,
) -> SchemaResult<()> {
    let normalizer = Normalizer::new(extra_method_names.iter().copied(), None);
    normalizer.normalize_root(model, key_path).map(|_| ())
}

/// Converts raw models into canonical model nodes.
pub(crate) struct Normalizer<'a> {
    reserved: HashSet<String>,
    transforms: Option<&'a HashMap<String, Transform>>,
}

impl<'a> Normalizer<'a> {
    pub fn new<'n>(
        extra_method_names: impl IntoIterator<Item = &'n str>,
        transforms: Option<&'a HashMap<String, Transform>>,
    ) -> Self {
        let reserved = RESERVED_NAMES
            .iter()
            .copied()
            .chain(extra_method_names)
            .map(str::to_string)
            .collect();
        Self {
            reserved,
            transforms,
        }
    }

    /// Normalizes a top-level model, which must be a plain object.
    pub fn normalize_root(&self, model: &Value, key_path: &KeyPath) -> SchemaResult<ModelNode> {
        let map = model.as_object().ok_or_else(|| {
            SchemaError::invalid_schema(key_path.clone(), "Top-level model must be an object")
        })?;

        if is_descriptor(map) {
            return Err(SchemaError::invalid_schema(
                key_path.clone(),
                "Top-level model must be a plain object, not a value descriptor",
            ));
        }

        self.normalize_container(map, key_path)
    }

    fn normalize_node(&self, raw: &Value, key_path: &KeyPath) -> SchemaResult<ModelNode> {
        match raw {
            Value::String(tag) => {
                let kind = resolve_tag(tag, key_path)?;
                Ok(ModelNode::Value(Arc::new(ValueSchema::bare(kind))))
            }
            Value::Object(map) if is_descriptor(map) => self.normalize_descriptor(map, key_path),
            Value::Object(map) => self.normalize_container(map, key_path),
            Value::Array(items) if items.len() == 1 => {
                let child = self.normalize_node(&items[0], key_path)?;
                Ok(ModelNode::DynamicMap(Arc::new(DynamicModel {
                    key_kind: PrimitiveKind::Number,
                    list: true,
                    child,
                })))
            }
            Value::Array(items) => Err(SchemaError::invalid_schema(
                key_path.clone(),
                format!(
                    "List shorthand takes exactly one element model, got {}",
                    items.len()
                ),
            )),
            other => Err(SchemaError::invalid_schema(
                key_path.clone(),
                format!(
                    "Invalid model value {}, expected a type tag, descriptor or object",
                    other
                ),
            )),
        }
    }

    fn normalize_container(
        &self,
        map: &Map<String, Value>,
        key_path: &KeyPath,
    ) -> SchemaResult<ModelNode> {
        if let Some((key, child)) = dynamic_entry(map) {
            let child = self.normalize_node(child, &key_path.child(key.as_str()))?;
            return Ok(ModelNode::DynamicMap(Arc::new(DynamicModel {
                key_kind: PrimitiveKind::String,
                list: false,
                child,
            })));
        }

        let mut fields = Vec::with_capacity(map.len());
        for (key, raw) in map {
            let field_path = key_path.child(key.as_str());
            if self.reserved.contains(key) {
                return Err(SchemaError::invalid_schema(
                    field_path,
                    format!("Key '{}' is reserved for node methods", key),
                ));
            }
            fields.push((key.clone(), self.normalize_node(raw, &field_path)?));
        }

        Ok(ModelNode::Object(Arc::new(ObjectModel { fields })))
    }

    fn normalize_descriptor(
        &self,
        map: &Map<String, Value>,
        key_path: &KeyPath,
    ) -> SchemaResult<ModelNode> {
        let tag = map.get("type").and_then(Value::as_str).unwrap_or_default();
        let mut schema = ValueSchema::bare(resolve_tag(tag, key_path)?);

        for (option, raw) in map {
            if option == "type" {
                continue;
            }
            if !VALUE_OPTIONS.contains(&option.as_str()) {
                return Err(SchemaError::invalid_schema(
                    key_path.clone(),
                    format!("Unrecognized descriptor option '{}'", option),
                ));
            }

            match option.as_str() {
                "default" => {
                    if !raw.is_null() {
                        schema.default = Some(raw.clone());
                    }
                }
                "required" => schema.required = expect_bool(option, raw, key_path)?,
                "lowercase" => schema.lowercase = expect_bool(option, raw, key_path)?,
                "uppercase" => schema.uppercase = expect_bool(option, raw, key_path)?,
                "trim" => schema.trim = expect_bool(option, raw, key_path)?,
                "min" => schema.min = Some(expect_number(option, raw, key_path)?),
                "max" => schema.max = Some(expect_number(option, raw, key_path)?),
                "minlength" => schema.minlength = Some(expect_length(option, raw, key_path)?),
                "maxlength" => schema.maxlength = Some(expect_length(option, raw, key_path)?),
                "match" => {
                    let pattern = raw.as_str().ok_or_else(|| {
                        malformed_option(option, "a regular expression string", key_path)
                    })?;
                    let regex = Regex::new(pattern).map_err(|e| {
                        SchemaError::invalid_schema(
                            key_path.clone(),
                            format!("Invalid pattern for 'match': {}", e),
                        )
                    })?;
                    schema.pattern = Some(regex);
                }
                "enum" => {
                    let values = raw
                        .as_array()
                        .ok_or_else(|| malformed_option(option, "an array", key_path))?;
                    schema.enum_values = Some(values.clone());
                }
                "get" => schema.get = self.resolve_transform(option, raw, key_path)?,
                "set" => schema.set = self.resolve_transform(option, raw, key_path)?,
                _ => {
                    return Err(SchemaError::invalid_schema(
                        key_path.clone(),
                        format!("Unrecognized descriptor option '{}'", option),
                    ))
                }
            }

            schema.declared.push(option.clone());
        }

        Ok(ModelNode::Value(Arc::new(schema)))
    }

    fn resolve_transform(
        &self,
        option: &str,
        raw: &Value,
        key_path: &KeyPath,
    ) -> SchemaResult<Option<NamedTransform>> {
        let name = raw
            .as_str()
            .ok_or_else(|| malformed_option(option, "a transform name", key_path))?;

        let Some(transforms) = self.transforms else {
            return Ok(None);
        };

        let func = transforms.get(name).ok_or_else(|| {
            SchemaError::invalid_schema(
                key_path.clone(),
                format!("Unknown transform '{}' for '{}'", name, option),
            )
        })?;

        Ok(Some(NamedTransform {
            name: name.to_string(),
            func: Arc::clone(func),
        }))
    }
}

/// An object carrying a string `type` is a value descriptor.
fn is_descriptor(map: &Map<String, Value>) -> bool {
    matches!(map.get("type"), Some(Value::String(_)))
}

/// Returns the single entry of a `{ <textTag>: child }` dynamic map.
fn dynamic_entry(map: &Map<String, Value>) -> Option<(&String, &Value)> {
    if map.len() != 1 {
        return None;
    }
    map.iter()
        .next()
        .filter(|(key, _)| PrimitiveKind::from_tag(key) == Some(PrimitiveKind::String))
}

fn resolve_tag(tag: &str, key_path: &KeyPath) -> SchemaResult<PrimitiveKind> {
    PrimitiveKind::from_tag(tag).ok_or_else(|| {
        SchemaError::invalid_schema(key_path.clone(), format!("Unknown type '{}'", tag))
    })
}

fn malformed_option(option: &str, expected: &str, key_path: &KeyPath) -> SchemaError {
    SchemaError::invalid_schema(
        key_path.clone(),
        format!("Option '{}' must be {}", option, expected),
    )
}

fn expect_bool(option: &str, raw: &Value, key_path: &KeyPath) -> SchemaResult<bool> {
    raw.as_bool()
        .ok_or_else(|| malformed_option(option, "a boolean", key_path))
}

fn expect_number(option: &str, raw: &Value, key_path: &KeyPath) -> SchemaResult<f64> {
    raw.as_f64()
        .ok_or_else(|| malformed_option(option, "a number", key_path))
}

fn expect_length(option: &str, raw: &Value, key_path: &KeyPath) -> SchemaResult<usize> {
    raw.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| malformed_option(option, "a non-negative integer", key_path))
}
