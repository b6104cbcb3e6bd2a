//! Observability subsystem for treeschema
//!
//! Structured logging through `tracing`. The library only emits events;
//! installing a subscriber is the binary's job (see [`init_logging`]).
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on validation or coercion
//! 3. Rejections log at DEBUG from the engine, at WARN from the model layer
//!
//! # Usage
//!
//! ```ignore
//! treeschema::observability::init_logging(false);
//! ```

mod events;

pub use events::Event;

use tracing_subscriber::EnvFilter;

use crate::schema::SchemaError;

const DEFAULT_LOG_FILTER: &str = "treeschema=info";

/// Installs a stderr `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter; `verbose` raises it to debug.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("treeschema=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    // A second initialization (tests, embedding applications) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(crate) fn model_rejected(err: &SchemaError) {
    tracing::warn!(
        event = %Event::ModelRejected,
        key_path = %err.key_path(),
        "{}",
        err.message()
    );
}

pub(crate) fn validation_failed(err: &SchemaError) {
    tracing::debug!(
        event = %Event::ValidationFailed,
        kind = err.kind().code(),
        key_path = %err.key_path(),
        "{}",
        err.message()
    );
}
