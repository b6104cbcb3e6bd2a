//! Schema type definitions
//!
//! Supported primitive kinds:
//! - string: UTF-8 text
//! - number: 64-bit floating point (JSON number)
//! - boolean: true/false
//!
//! Containers (objects, arrays) are described structurally by the model,
//! never by a primitive kind.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical primitive kinds known to the type registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// Text
    String,
    /// Number
    Number,
    /// Boolean
    Boolean,
}

impl PrimitiveKind {
    /// Resolves a textual type tag.
    ///
    /// Both the lowercase primitive names and the capitalized type names
    /// are accepted: `string`, `String`, `number`, `Number`, `boolean`, `Boolean`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" | "String" => Some(PrimitiveKind::String),
            "number" | "Number" => Some(PrimitiveKind::Number),
            "boolean" | "Boolean" => Some(PrimitiveKind::Boolean),
            _ => None,
        }
    }

    /// Resolves a Rust type identity to the primitive kind it is stored as.
    ///
    /// Converts into a model type tag, so typed models can be written as
    /// `json!({"age": Value::from(PrimitiveKind::of::<u32>()?)})`.
    pub fn of<T: ?Sized + 'static>() -> Option<Self> {
        let id = TypeId::of::<T>();
        let text = [
            TypeId::of::<String>(),
            TypeId::of::<str>(),
            TypeId::of::<&'static str>(),
            TypeId::of::<char>(),
        ];
        let numbers = [
            TypeId::of::<f64>(),
            TypeId::of::<f32>(),
            TypeId::of::<i8>(),
            TypeId::of::<i16>(),
            TypeId::of::<i32>(),
            TypeId::of::<i64>(),
            TypeId::of::<isize>(),
            TypeId::of::<u8>(),
            TypeId::of::<u16>(),
            TypeId::of::<u32>(),
            TypeId::of::<u64>(),
            TypeId::of::<usize>(),
        ];

        if text.contains(&id) {
            Some(PrimitiveKind::String)
        } else if numbers.contains(&id) {
            Some(PrimitiveKind::Number)
        } else if id == TypeId::of::<bool>() {
            Some(PrimitiveKind::Boolean)
        } else {
            None
        }
    }

    /// Returns the printable primitive name (`typeof`)
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
        }
    }

    /// Returns whether a runtime value is of this kind
    pub fn matches(&self, value: &Value) -> bool {
        type_of(value) == self.type_name()
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Returns the runtime primitive name of a value.
///
/// Containers report `object`, null reports `null`.
pub fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "object",
    }
}

/// Returns whether a value counts as present.
///
/// `null`, `false`, `0` and `""` are falsy. Containers are always truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl From<PrimitiveKind> for Value {
    /// The canonical type tag, accepted anywhere a model names a type
    fn from(kind: PrimitiveKind) -> Self {
        Value::String(kind.type_name().to_string())
    }
}

/// Parses a list index key.
///
/// Only canonical decimal text is an index: `"1"` is, `"01"` and `"+1"` are not.
pub(crate) fn parse_index(key: &str) -> Option<usize> {
    key.parse::<usize>()
        .ok()
        .filter(|index| index.to_string() == key)
}

/// Returns whether a value is an object or array
pub fn is_container(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// Ordered sequence of keys from the schema root to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// The empty path of a tree root
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns the terminal key, `None` for the root
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns this path with `key` appended
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.into());
        Self(segments)
    }

    /// Returns this path with its last segment removed
    pub fn parent(&self) -> Self {
        let mut segments = self.0.clone();
        segments.pop();
        Self(segments)
    }

    /// Returns this path followed by all segments of `other`
    pub fn join(&self, other: &KeyPath) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns the segments after `prefix`, if this path starts with it
    pub fn strip_prefix(&self, prefix: &KeyPath) -> Option<KeyPath> {
        self.0
            .strip_prefix(prefix.0.as_slice())
            .map(|rest| Self(rest.to_vec()))
    }

    /// Joins the segments with a delimiter (`a.b.c` for `.`)
    pub fn to_delimited(&self, delimiter: &str) -> String {
        self.0.join(delimiter)
    }

    /// Parses a delimited path. The empty string is the root path.
    pub fn parse(path: &str, delimiter: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self(path.split(delimiter).map(str::to_string).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl<S: Into<String>> From<Vec<S>> for KeyPath {
    fn from(segments: Vec<S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for KeyPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Read or write transform applied to a leaf value
pub type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A transform together with the name it was registered under
#[derive(Clone)]
pub struct NamedTransform {
    pub name: String,
    pub func: Transform,
}

impl NamedTransform {
    pub fn apply(&self, value: &Value) -> Value {
        (self.func)(value)
    }
}

impl fmt::Debug for NamedTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedTransform")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Descriptor option names accepted beside `type`
pub const VALUE_OPTIONS: [&str; 13] = [
    "default",
    "required",
    "max",
    "min",
    "lowercase",
    "uppercase",
    "trim",
    "match",
    "enum",
    "minlength",
    "maxlength",
    "get",
    "set",
];

/// Canonical constraint set of a Value node, every option defaulted
#[derive(Debug, Clone)]
pub struct ValueSchema {
    /// Resolved primitive kind
    pub kind: PrimitiveKind,
    pub default: Option<Value>,
    pub required: bool,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub lowercase: bool,
    pub uppercase: bool,
    pub trim: bool,
    pub pattern: Option<Regex>,
    pub enum_values: Option<Vec<Value>>,
    pub minlength: Option<usize>,
    pub maxlength: Option<usize>,
    pub get: Option<NamedTransform>,
    pub set: Option<NamedTransform>,
    /// Option names spelled out in the model, in declaration order
    pub(crate) declared: Vec<String>,
}

impl ValueSchema {
    /// A bare leaf of the given kind with no constraints
    pub fn bare(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            default: None,
            required: false,
            max: None,
            min: None,
            lowercase: false,
            uppercase: false,
            trim: false,
            pattern: None,
            enum_values: None,
            minlength: None,
            maxlength: None,
            get: None,
            set: None,
            declared: Vec::new(),
        }
    }

    /// Returns the printable primitive name (`typeof`)
    pub fn type_of(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Option names declared in the model
    pub fn declared_options(&self) -> &[String] {
        &self.declared
    }

    /// Serializable summary of the constraint set
    pub fn describe(&self) -> Value {
        let mut out = serde_json::Map::new();
        out.insert("type".into(), Value::from(self.type_of()));
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        out.insert("required".into(), Value::from(self.required));
        if let Some(min) = self.min {
            out.insert("min".into(), Value::from(min));
        }
        if let Some(max) = self.max {
            out.insert("max".into(), Value::from(max));
        }
        for (flag, set) in [
            ("lowercase", self.lowercase),
            ("uppercase", self.uppercase),
            ("trim", self.trim),
        ] {
            if set {
                out.insert(flag.into(), Value::from(true));
            }
        }
        if let Some(pattern) = &self.pattern {
            out.insert("match".into(), Value::from(pattern.as_str()));
        }
        if let Some(values) = &self.enum_values {
            out.insert("enum".into(), Value::from(values.clone()));
        }
        if let Some(minlength) = self.minlength {
            out.insert("minlength".into(), Value::from(minlength));
        }
        if let Some(maxlength) = self.maxlength {
            out.insert("maxlength".into(), Value::from(maxlength));
        }
        if let Some(get) = &self.get {
            out.insert("get".into(), Value::from(get.name.clone()));
        }
        if let Some(set) = &self.set {
            out.insert("set".into(), Value::from(set.name.clone()));
        }
        Value::Object(out)
    }
}

/// Normalized model node
#[derive(Debug, Clone)]
pub(crate) enum ModelNode {
    Value(Arc<ValueSchema>),
    Object(Arc<ObjectModel>),
    DynamicMap(Arc<DynamicModel>),
}

/// Literal fields of an object node, in declaration order
#[derive(Debug, Default)]
pub(crate) struct ObjectModel {
    pub fields: Vec<(String, ModelNode)>,
}

impl ObjectModel {
    pub fn get(&self, key: &str) -> Option<&ModelNode> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, node)| node)
    }
}

/// Shared child template of a dynamic-map node
#[derive(Debug)]
pub(crate) struct DynamicModel {
    /// Kind named by the model's single key
    pub key_kind: PrimitiveKind,
    /// Declared with the single-element list shorthand
    pub list: bool,
    pub child: ModelNode,
}
