//! Schema error types
//!
//! Violation kinds:
//! - INVALID_SCHEMA: malformed model
//! - INVALID_PATH: data key path absent from the schema
//! - TYPE, REQUIRED, MIN, MAX, MINLENGTH, MAXLENGTH, MATCH, ENUM: leaf constraints
//! - SET: write attempted on a schema node
//!
//! Every error carries the key path at which it occurred. Errors are
//! fail-fast: a walk aborts on the first violation.

use std::fmt;

use super::types::KeyPath;

/// Closed set of violation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaErrorKind {
    /// Malformed model: reserved key, bad type, unknown option, non-object root
    InvalidSchema,
    /// Data contains a key path absent from the schema
    InvalidPath,
    /// Primitive kind mismatch
    Type,
    /// Falsy value where `required` is set
    Required,
    /// Number above `max`
    Max,
    /// Number below `min`
    Min,
    /// Text fails `match`
    Match,
    /// Value outside `enum`
    Enum,
    /// Text shorter than `minlength`
    MinLength,
    /// Text longer than `maxlength`
    MaxLength,
    /// Write attempted on a schema node
    Set,
}

impl SchemaErrorKind {
    /// Returns the stable kind identifier
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorKind::InvalidSchema => "INVALID_SCHEMA",
            SchemaErrorKind::InvalidPath => "INVALID_PATH",
            SchemaErrorKind::Type => "TYPE",
            SchemaErrorKind::Required => "REQUIRED",
            SchemaErrorKind::Max => "MAX",
            SchemaErrorKind::Min => "MIN",
            SchemaErrorKind::Match => "MATCH",
            SchemaErrorKind::Enum => "ENUM",
            SchemaErrorKind::MinLength => "MINLENGTH",
            SchemaErrorKind::MaxLength => "MAXLENGTH",
            SchemaErrorKind::Set => "SET",
        }
    }

    /// Returns the error name reported to callers
    pub fn name(&self) -> &'static str {
        match self {
            SchemaErrorKind::InvalidSchema => "SchemaError",
            SchemaErrorKind::InvalidPath => "SchemaKeyPathError",
            SchemaErrorKind::Type => "SchemaTypeError",
            SchemaErrorKind::Required => "SchemaRequiredError",
            SchemaErrorKind::Max => "SchemaMaxError",
            SchemaErrorKind::Min => "SchemaMinError",
            SchemaErrorKind::Match => "SchemaMatchError",
            SchemaErrorKind::Enum => "SchemaEnumError",
            SchemaErrorKind::MinLength => "SchemaMinlengthError",
            SchemaErrorKind::MaxLength => "SchemaMaxlengthError",
            SchemaErrorKind::Set => "SchemaSetError",
        }
    }

    /// Returns whether the violation concerns a data value rather than the model
    pub fn is_data_violation(&self) -> bool {
        !matches!(self, SchemaErrorKind::InvalidSchema | SchemaErrorKind::Set)
    }
}

impl fmt::Display for SchemaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Expected vs. actual for a data violation
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationDetails {
    /// Expected type, bound, pattern or set
    pub expected: String,
    /// Actual value or type found
    pub actual: String,
}

impl ViolationDetails {
    pub fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for ViolationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.actual)
    }
}

/// Schema error with full path context
#[derive(Debug, Clone)]
pub struct SchemaError {
    kind: SchemaErrorKind,
    key_path: KeyPath,
    message: String,
    details: Option<ViolationDetails>,
}

impl SchemaError {
    /// Create an error of the given kind
    pub fn new(kind: SchemaErrorKind, key_path: KeyPath, message: impl Into<String>) -> Self {
        Self {
            kind,
            key_path,
            message: message.into(),
            details: None,
        }
    }

    /// Attach expected/actual details
    pub fn with_details(mut self, details: ViolationDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Create a malformed model error
    pub fn invalid_schema(key_path: KeyPath, message: impl Into<String>) -> Self {
        Self::new(SchemaErrorKind::InvalidSchema, key_path, message)
    }

    /// Create an unknown key path error
    pub fn invalid_path(key_path: KeyPath) -> Self {
        Self::new(
            SchemaErrorKind::InvalidPath,
            key_path,
            "Key path does not exist in schema",
        )
    }

    /// Create an immutability error
    pub fn immutable(key_path: KeyPath) -> Self {
        Self::new(
            SchemaErrorKind::Set,
            key_path,
            "Schemas are immutable. Do not attempt to set their properties",
        )
    }

    /// Returns the violation kind
    pub fn kind(&self) -> SchemaErrorKind {
        self.kind
    }

    /// Returns the key path at which the violation occurred
    pub fn key_path(&self) -> &KeyPath {
        &self.key_path
    }

    /// Returns the message without the path prefix
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns expected/actual details if applicable
    pub fn details(&self) -> Option<&ViolationDetails> {
        self.details.as_ref()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.kind.name())?;
        if !self.key_path.is_empty() {
            write!(f, "{} ", self.key_path)?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
