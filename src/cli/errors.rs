//! CLI-specific error types

use std::io;

use thiserror::Error;

use crate::schema::SchemaError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    /// Model rejected or data violation
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// I/O error (stdin/stdout, model files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed JSON on stdin
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Empty input")]
    EmptyInput,
}

impl CliError {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema(e) => e.kind().code(),
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::EmptyInput => "EMPTY_INPUT",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KeyPath;

    #[test]
    fn test_schema_error_codes_pass_through() {
        let err: CliError = SchemaError::invalid_path(KeyPath::from(vec!["a"])).into();
        assert_eq!(err.code(), "INVALID_PATH");
        assert!(err.to_string().starts_with("SchemaKeyPathError"));
    }

    #[test]
    fn test_io_codes() {
        assert_eq!(CliError::EmptyInput.code(), "EMPTY_INPUT");
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(CliError::from(json_err).code(), "JSON_ERROR");
    }
}
