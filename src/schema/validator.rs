//! Schema validator for data trees
//!
//! Validation semantics:
//! - Data and schema are walked in lock-step, schema-declaration order, depth-first
//! - DynamicMap children are each validated against the shared template,
//!   independently of their siblings
//! - Data keys the schema cannot resolve fail with INVALID_PATH, after the walk
//! - Falsy values skip type and constraint checks and only face `required`
//! - Fail-fast: the first violation aborts the walk
//!
//! The validator never mutates data.

use serde_json::Value;

use super::errors::{SchemaError, SchemaErrorKind, SchemaResult, ViolationDetails};
use super::tree::SchemaNode;
use super::types::{is_container, is_truthy, type_of, KeyPath, ModelNode, PrimitiveKind, ValueSchema};
use crate::observability;

/// Options for a validation walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Skip the `required` check
    pub ignore_required: bool,
}

impl ValidateOptions {
    /// Options that suppress REQUIRED violations
    pub fn ignore_required() -> Self {
        Self {
            ignore_required: true,
        }
    }
}

/// Validates `data` against `node`, returning the data unchanged.
pub fn validate<'d>(
    data: &'d Value,
    node: &SchemaNode,
    options: ValidateOptions,
) -> SchemaResult<&'d Value> {
    SchemaValidator::new(options)
        .validate(data, node)
        .map(|_| data)
        .map_err(|e| {
            observability::validation_failed(&e);
            e
        })
}

/// Paired schema/data walker that checks constraints.
pub struct SchemaValidator {
    options: ValidateOptions,
}

impl SchemaValidator {
    pub fn new(options: ValidateOptions) -> Self {
        Self { options }
    }

    /// Validates a data tree, or a single value when `data` is not a container.
    pub fn validate(&self, data: &Value, node: &SchemaNode) -> SchemaResult<()> {
        if !is_container(data) {
            return self.validate_single(data, node);
        }

        self.walk(Some(data), node)?;
        find_orphan(data, node)
    }

    /// Validates a non-container value in isolation.
    fn validate_single(&self, value: &Value, node: &SchemaNode) -> SchemaResult<()> {
        match node.model() {
            ModelNode::Value(schema) => {
                validate_value(Some(value), schema, node.key_path(), self.options)
            }
            _ if is_truthy(value) => Err(container_mismatch(node.key_path(), value)),
            _ => Ok(()),
        }
    }

    fn walk(&self, data: Option<&Value>, node: &SchemaNode) -> SchemaResult<()> {
        match node.model() {
            ModelNode::Value(schema) => validate_value(data, schema, node.key_path(), self.options),
            ModelNode::Object(object) => {
                let fields = match data {
                    Some(Value::Object(map)) => Some(map),
                    Some(value) if is_truthy(value) => {
                        return Err(container_mismatch(node.key_path(), value));
                    }
                    _ => None,
                };

                for (field, _) in &object.fields {
                    let Some(child) = node.resolve(field) else {
                        continue;
                    };
                    self.walk(fields.and_then(|map| map.get(field)), &child)?;
                }
                Ok(())
            }
            ModelNode::DynamicMap(_) => match data {
                Some(Value::Object(map)) => {
                    for (key, value) in map {
                        if let Some(child) = node.resolve(key) {
                            self.walk(Some(value), &child)?;
                        }
                    }
                    Ok(())
                }
                Some(Value::Array(items)) => {
                    for (index, value) in items.iter().enumerate() {
                        if let Some(child) = node.resolve(&index.to_string()) {
                            self.walk(Some(value), &child)?;
                        }
                    }
                    Ok(())
                }
                Some(value) if is_truthy(value) => Err(container_mismatch(node.key_path(), value)),
                _ => Ok(()),
            },
        }
    }
}

/// Fails with INVALID_PATH on the first data key the schema cannot resolve.
fn find_orphan(data: &Value, node: &SchemaNode) -> SchemaResult<()> {
    if matches!(node.model(), ModelNode::Value(_)) {
        return Ok(());
    }

    let entries: Vec<(String, &Value)> = match data {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => return Ok(()),
    };

    for (key, value) in entries {
        let child = node
            .resolve(&key)
            .ok_or_else(|| SchemaError::invalid_path(node.key_path().child(key.as_str())))?;
        find_orphan(value, &child)?;
    }

    Ok(())
}

/// Validates one leaf value against its constraint set.
pub(crate) fn validate_value(
    value: Option<&Value>,
    schema: &ValueSchema,
    key_path: &KeyPath,
    options: ValidateOptions,
) -> SchemaResult<()> {
    let present = value.filter(|v| is_truthy(v));

    let Some(value) = present else {
        if schema.required && !options.ignore_required {
            let shown = value.map_or_else(|| "undefined".to_string(), display_value);
            return Err(violation(
                SchemaErrorKind::Required,
                key_path,
                format!("Marked as required, got {}", shown),
                ViolationDetails::new("a value", shown),
            ));
        }
        return Ok(());
    };

    let shown = display_value(value);

    if !schema.kind.matches(value) {
        return Err(violation(
            SchemaErrorKind::Type,
            key_path,
            format!(
                "Invalid type '{}' for value {}, should be type '{}'",
                type_of(value),
                shown,
                schema.type_of()
            ),
            ViolationDetails::new(schema.type_of(), type_of(value)),
        ));
    }

    match schema.kind {
        PrimitiveKind::Number => {
            let number = value.as_f64().unwrap_or_default();
            if let Some(min) = schema.min.filter(|min| number < *min) {
                return Err(violation(
                    SchemaErrorKind::Min,
                    key_path,
                    format!("Number {} less than minimum {}", shown, min),
                    ViolationDetails::new(format!(">= {}", min), shown),
                ));
            }
            if let Some(max) = schema.max.filter(|max| number > *max) {
                return Err(violation(
                    SchemaErrorKind::Max,
                    key_path,
                    format!("Number {} greater than maximum {}", shown, max),
                    ViolationDetails::new(format!("<= {}", max), shown),
                ));
            }
        }
        PrimitiveKind::String => {
            let text = value.as_str().unwrap_or_default();
            let length = text.chars().count();
            if let Some(maxlength) = schema.maxlength.filter(|max| length > *max) {
                return Err(violation(
                    SchemaErrorKind::MaxLength,
                    key_path,
                    format!(
                        "String length of value {} greater than max length {}",
                        shown, maxlength
                    ),
                    ViolationDetails::new(format!("length <= {}", maxlength), length.to_string()),
                ));
            }
            if let Some(minlength) = schema.minlength.filter(|min| length < *min) {
                return Err(violation(
                    SchemaErrorKind::MinLength,
                    key_path,
                    format!(
                        "String length of value {} less than min length {}",
                        shown, minlength
                    ),
                    ViolationDetails::new(format!("length >= {}", minlength), length.to_string()),
                ));
            }
            if let Some(pattern) = schema.pattern.as_ref().filter(|p| !p.is_match(text)) {
                return Err(violation(
                    SchemaErrorKind::Match,
                    key_path,
                    format!("String {} does not match pattern /{}/", shown, pattern.as_str()),
                    ViolationDetails::new(format!("/{}/", pattern.as_str()), shown),
                ));
            }
        }
        PrimitiveKind::Boolean => {}
    }

    if let Some(values) = &schema.enum_values {
        if !values.iter().any(|candidate| same_value(candidate, value)) {
            let listed = values
                .iter()
                .map(display_value)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(violation(
                SchemaErrorKind::Enum,
                key_path,
                format!("Value {} is not in the enum [{}]", shown, listed),
                ViolationDetails::new(format!("one of [{}]", listed), shown),
            ));
        }
    }

    Ok(())
}

fn violation(
    kind: SchemaErrorKind,
    key_path: &KeyPath,
    message: String,
    details: ViolationDetails,
) -> SchemaError {
    SchemaError::new(kind, key_path.clone(), message).with_details(details)
}

/// TYPE violation for a truthy non-object where an object is declared.
fn container_mismatch(key_path: &KeyPath, value: &Value) -> SchemaError {
    let actual = match value {
        Value::Array(_) => "array",
        other => type_of(other),
    };
    violation(
        SchemaErrorKind::Type,
        key_path,
        format!(
            "Invalid type '{}' for value {}, should be type 'object'",
            actual,
            display_value(value)
        ),
        ViolationDetails::new("object", actual),
    )
}

/// Renders a value for messages: text is quoted, everything else is JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

/// Enum membership; numbers compare by value so `1` matches `1.0`.
fn same_value(candidate: &Value, value: &Value) -> bool {
    match (candidate.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => candidate == value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tree::Schema;
    use serde_json::json;

    fn constraints() -> Schema {
        Schema::new(json!({
            "requiredStr": { "type": "String", "required": true },
            "defaultHello": { "type": "String", "default": "hello" },
            "maxTen": { "type": "Number", "max": 10 },
            "minFive": { "type": "Number", "min": 5 },
            "matchWow": { "type": "String", "match": "wow" },
            "enumVowels": { "type": "String", "enum": ["a", "e", "i", "o", "u"] },
            "maxTenStr": { "type": "String", "maxlength": 10 },
            "minFiveStr": { "type": "String", "minlength": 5 }
        }))
        .unwrap()
    }

    fn kind_at(schema: &Schema, field: &str, value: Value) -> Option<SchemaErrorKind> {
        schema
            .node([field])
            .unwrap()
            .validate(&value)
            .err()
            .map(|e| e.kind())
    }

    #[test]
    fn test_required() {
        let schema = constraints();
        let err = schema.validate(&json!({})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Required);
        assert_eq!(err.key_path(), &KeyPath::from(vec!["requiredStr"]));
        assert!(schema.validate(&json!({"requiredStr": "hello"})).is_ok());
    }

    #[test]
    fn test_required_can_be_ignored() {
        let schema = constraints();
        assert!(schema
            .validate_with(&json!({}), ValidateOptions::ignore_required())
            .is_ok());
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let schema = constraints();
        let err = schema.validate(&json!({"requiredStr": ""})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Required);
        assert!(err.message().contains("''"));
    }

    #[test]
    fn test_numeric_bounds() {
        let schema = constraints();
        assert_eq!(kind_at(&schema, "maxTen", json!(11)), Some(SchemaErrorKind::Max));
        assert_eq!(kind_at(&schema, "maxTen", json!(9)), None);
        assert_eq!(kind_at(&schema, "minFive", json!(4)), Some(SchemaErrorKind::Min));
        assert_eq!(kind_at(&schema, "minFive", json!(6)), None);
    }

    #[test]
    fn test_text_constraints() {
        let schema = constraints();
        assert_eq!(
            kind_at(&schema, "matchWow", json!("wokawoka")),
            Some(SchemaErrorKind::Match)
        );
        assert_eq!(kind_at(&schema, "matchWow", json!("kawowza")), None);
        assert_eq!(
            kind_at(&schema, "enumVowels", json!("w")),
            Some(SchemaErrorKind::Enum)
        );
        assert_eq!(kind_at(&schema, "enumVowels", json!("a")), None);
        assert_eq!(
            kind_at(&schema, "maxTenStr", json!("12345678910")),
            Some(SchemaErrorKind::MaxLength)
        );
        assert_eq!(kind_at(&schema, "maxTenStr", json!("abc")), None);
        assert_eq!(
            kind_at(&schema, "minFiveStr", json!("abc")),
            Some(SchemaErrorKind::MinLength)
        );
        assert_eq!(kind_at(&schema, "minFiveStr", json!("12345678910")), None);
    }

    #[test]
    fn test_falsy_values_skip_type_checks() {
        let schema = constraints();
        assert_eq!(kind_at(&schema, "maxTen", json!(0)), None);
        assert_eq!(kind_at(&schema, "maxTen", json!(false)), None);
        assert_eq!(kind_at(&schema, "maxTen", json!("")), None);
    }

    #[test]
    fn test_type_mismatch_details() {
        let schema = Schema::new(json!({"info": {"name": "string"}})).unwrap();
        let err = schema.validate(&json!({"info": {"name": 123}})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Type);
        let details = err.details().unwrap();
        assert_eq!(details.expected, "string");
        assert_eq!(details.actual, "number");
        assert_eq!(err.key_path(), &KeyPath::from(vec!["info", "name"]));
    }

    #[test]
    fn test_unknown_key_path() {
        let schema = Schema::new(json!({"info": {"name": "string"}})).unwrap();
        let err = schema.validate(&json!({"info": {"blah": true}})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::InvalidPath);
        assert_eq!(err.key_path(), &KeyPath::from(vec!["info", "blah"]));
    }

    #[test]
    fn test_declared_violation_reported_before_orphan() {
        let schema = Schema::new(json!({"a": {"type": "number", "max": 1}})).unwrap();
        let err = schema.validate(&json!({"zzz": 1, "a": 5})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Max);
    }

    #[test]
    fn test_container_where_leaf_declared() {
        let schema = Schema::new(json!({"dob": "number"})).unwrap();
        let err = schema.validate(&json!({"dob": {"year": 1990}})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Type);
    }

    #[test]
    fn test_leaf_where_object_declared() {
        let schema = Schema::new(json!({"info": {"name": "string"}})).unwrap();
        let err = schema.validate(&json!({"info": "flat"})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Type);
        assert_eq!(err.details().unwrap().expected, "object");
    }

    #[test]
    fn test_required_inside_absent_object() {
        let schema =
            Schema::new(json!({"info": {"dob": {"type": "number", "required": true}}})).unwrap();
        let err = schema.validate(&json!({"other": null})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Required);
        assert_eq!(err.key_path(), &KeyPath::from(vec!["info", "dob"]));
    }

    #[test]
    fn test_list_children_validated_per_index() {
        let schema = Schema::new(json!({"tags": [{"type": "string", "maxlength": 3}]})).unwrap();
        assert!(schema.validate(&json!({"tags": ["a", "bc"]})).is_ok());
        let err = schema.validate(&json!({"tags": ["a", "toolong"]})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::MaxLength);
        assert_eq!(err.key_path(), &KeyPath::from(vec!["tags", "1"]));
    }

    #[test]
    fn test_enum_numbers_compare_by_value() {
        let schema = Schema::new(json!({"n": {"type": "number", "enum": [1, 2]}})).unwrap();
        assert!(schema.validate(&json!({"n": 1.0})).is_ok());
        assert!(schema.validate(&json!({"n": 3})).is_err());
    }

    #[test]
    fn test_validate_returns_input() {
        let schema = Schema::new(json!({"dob": "number"})).unwrap();
        let data = json!({"dob": 80});
        assert_eq!(schema.validate(&data).unwrap(), &data);
    }
}
