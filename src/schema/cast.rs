//! Cast / coercion engine
//!
//! Pipeline for container input:
//! 1. validate the raw input (REQUIRED suppressed, defaults may still fill it)
//! 2. coerce every leaf in a paired walk: default, lowercase, uppercase, trim,
//!    record the `get` transform, apply the `set` transform
//! 3. re-validate the coerced tree with every constraint enforced
//! 4. wrap the result in a [`BoundObject`]
//!
//! Non-container input is validated, coerced and re-validated as a single
//! value and never wrapped.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::bound::BoundObject;
use super::errors::SchemaResult;
use super::tree::SchemaNode;
use super::types::{is_container, is_truthy, KeyPath, ModelNode, NamedTransform, PrimitiveKind, ValueSchema};
use super::validator::{validate, ValidateOptions};
use crate::observability::Event;

/// Result of a cast
#[derive(Debug, Clone)]
pub enum Cast {
    /// Coerced non-container value
    Value(Value),
    /// Coerced container, bound to its schema node
    Bound(BoundObject),
}

impl Cast {
    pub fn is_bound(&self) -> bool {
        matches!(self, Cast::Bound(_))
    }

    pub fn as_bound(&self) -> Option<&BoundObject> {
        match self {
            Cast::Bound(bound) => Some(bound),
            Cast::Value(_) => None,
        }
    }

    pub fn into_bound(self) -> Option<BoundObject> {
        match self {
            Cast::Bound(bound) => Some(bound),
            Cast::Value(_) => None,
        }
    }

    /// Returns the value as a reader sees it, with `get` transforms applied
    pub fn to_value(&self) -> Value {
        match self {
            Cast::Value(value) => value.clone(),
            Cast::Bound(bound) => bound.to_value(),
        }
    }

    /// Returns the stored value, without `get` transforms
    pub fn into_raw(self) -> Value {
        match self {
            Cast::Value(value) => value,
            Cast::Bound(bound) => bound.into_raw(),
        }
    }
}

/// Read/write transforms recorded for one key path
#[derive(Debug, Clone, Default)]
pub struct HookEntry {
    pub get: Option<NamedTransform>,
    pub set: Option<NamedTransform>,
}

/// Per-cast side table from absolute key path to the recorded transforms.
///
/// Every cast allocates its own table; tables are never shared between casts.
#[derive(Debug, Clone, Default)]
pub struct HookTable {
    entries: BTreeMap<KeyPath, HookEntry>,
}

impl HookTable {
    /// Returns the read transform recorded at `key_path`
    pub fn getter(&self, key_path: &KeyPath) -> Option<&NamedTransform> {
        self.entries.get(key_path).and_then(|entry| entry.get.as_ref())
    }

    /// Returns the write transform recorded at `key_path`
    pub fn setter(&self, key_path: &KeyPath) -> Option<&NamedTransform> {
        self.entries.get(key_path).and_then(|entry| entry.set.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record_get(&mut self, key_path: &KeyPath, transform: &NamedTransform) {
        self.entries.entry(key_path.clone()).or_default().get = Some(transform.clone());
    }

    fn record_set(&mut self, key_path: &KeyPath, transform: &NamedTransform) {
        self.entries.entry(key_path.clone()).or_default().set = Some(transform.clone());
    }

    /// Replaces every entry at or below `prefix` with the matching entries of `other`.
    pub(crate) fn replace_subtree(&mut self, prefix: &KeyPath, other: HookTable) {
        self.entries.retain(|path, _| !path.starts_with(prefix));
        self.entries.extend(
            other
                .entries
                .into_iter()
                .filter(|(path, _)| path.starts_with(prefix)),
        );
    }
}

/// Validates and coerces `data` against `node`.
pub fn cast(data: Value, node: &SchemaNode) -> SchemaResult<Cast> {
    if !is_container(&data) {
        validate(&data, node, ValidateOptions::ignore_required())?;

        let coerced = match node.model() {
            ModelNode::Value(schema) => {
                let mut hooks = HookTable::default();
                coerce_value(Some(&data), schema, node.key_path(), &mut hooks)
                    .unwrap_or(Value::Null)
            }
            _ => data,
        };

        validate(&coerced, node, ValidateOptions::default())?;
        return Ok(Cast::Value(coerced));
    }

    let (coerced, hooks) = cast_tree(&data, node)?;
    Ok(Cast::Bound(BoundObject::new(node.clone(), coerced, hooks)))
}

/// Runs the validate, coerce, re-validate pipeline on a container.
///
/// Returns the coerced tree and the side table recorded while coercing it.
pub(crate) fn cast_tree(data: &Value, node: &SchemaNode) -> SchemaResult<(Value, HookTable)> {
    validate(data, node, ValidateOptions::ignore_required())?;

    let mut hooks = HookTable::default();
    let coerced = coerce(Some(data), node, &mut hooks).unwrap_or_else(|| data.clone());

    validate(&coerced, node, ValidateOptions::default())?;

    tracing::debug!(
        event = %Event::CastComplete,
        key_path = %node.key_path(),
        hooks = hooks.len(),
        "cast complete"
    );

    Ok((coerced, hooks))
}

/// Paired walk producing the coerced value; `None` means "absent".
fn coerce(data: Option<&Value>, node: &SchemaNode, hooks: &mut HookTable) -> Option<Value> {
    match node.model() {
        ModelNode::Value(schema) => coerce_value(data, schema, node.key_path(), hooks),
        ModelNode::Object(object) => {
            let input = match data {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            };

            let mut out = Map::new();
            for (field, _) in &object.fields {
                let Some(child) = node.resolve(field) else {
                    continue;
                };
                if let Some(value) = coerce(input.and_then(|map| map.get(field)), &child, hooks) {
                    out.insert(field.clone(), value);
                }
            }

            if input.is_some() || !out.is_empty() {
                Some(Value::Object(out))
            } else {
                data.cloned()
            }
        }
        // The map itself is never coerced, only its synthesized children.
        ModelNode::DynamicMap(_) => match data {
            Some(Value::Object(map)) => {
                let mut out = Map::new();
                for (key, value) in map {
                    let coerced = match node.resolve(key) {
                        Some(child) => coerce(Some(value), &child, hooks),
                        None => Some(value.clone()),
                    };
                    if let Some(coerced) = coerced {
                        out.insert(key.clone(), coerced);
                    }
                }
                Some(Value::Object(out))
            }
            Some(Value::Array(items)) => Some(Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, value)| match node.resolve(&index.to_string()) {
                        Some(child) => coerce(Some(value), &child, hooks).unwrap_or(Value::Null),
                        None => value.clone(),
                    })
                    .collect(),
            )),
            other => other.cloned(),
        },
    }
}

/// Coerces one leaf value.
fn coerce_value(
    value: Option<&Value>,
    schema: &ValueSchema,
    key_path: &KeyPath,
    hooks: &mut HookTable,
) -> Option<Value> {
    let mut value = value.cloned();

    if !value.as_ref().is_some_and(is_truthy) {
        if let Some(default) = schema.default.as_ref().filter(|d| is_truthy(d)) {
            value = Some(default.clone());
        }
    }

    if schema.kind == PrimitiveKind::String {
        if let Some(Value::String(text)) = &mut value {
            if schema.lowercase {
                *text = text.to_lowercase();
            }
            if schema.uppercase {
                *text = text.to_uppercase();
            }
            if schema.trim {
                *text = text.trim().to_string();
            }
        }
    }

    if !value.as_ref().is_some_and(is_truthy) {
        return value;
    }

    if let Some(get) = &schema.get {
        hooks.record_get(key_path, get);
    }

    if let Some(set) = &schema.set {
        hooks.record_set(key_path, set);
        value = value.map(|v| set.apply(&v));
    }

    value
}
