//! Observability events for treeschema
//!
//! Events are explicit and typed. Each is emitted through `tracing` with
//! its SCREAMING_SNAKE_CASE name in the `event` field.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Model lifecycle
    /// Model normalized and schema tree materialized
    SchemaBuilt,
    /// Model rejected during normalization
    ModelRejected,
    /// Model document read from disk
    ModelLoaded,
    /// Model directory scanned
    ModelsLoaded,

    // Data pipeline
    /// Validation walk aborted on a violation
    ValidationFailed,
    /// Cast pipeline produced a coerced value
    CastComplete,
    /// Bound object accepted a write
    BoundWrite,
    /// Bound object rejected a write, data left unchanged
    BoundWriteRejected,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SchemaBuilt => "SCHEMA_BUILT",
            Event::ModelRejected => "MODEL_REJECTED",
            Event::ModelLoaded => "MODEL_LOADED",
            Event::ModelsLoaded => "MODELS_LOADED",
            Event::ValidationFailed => "VALIDATION_FAILED",
            Event::CastComplete => "CAST_COMPLETE",
            Event::BoundWrite => "BOUND_WRITE",
            Event::BoundWriteRejected => "BOUND_WRITE_REJECTED",
        }
    }

    /// Returns whether the event reports a rejected operation
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ModelRejected | Event::ValidationFailed | Event::BoundWriteRejected
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Event::SchemaBuilt.as_str(), "SCHEMA_BUILT");
        assert_eq!(Event::BoundWriteRejected.to_string(), "BOUND_WRITE_REJECTED");
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::ValidationFailed.is_failure());
        assert!(Event::ModelRejected.is_failure());
        assert!(!Event::CastComplete.is_failure());
        assert!(!Event::BoundWrite.is_failure());
    }
}
