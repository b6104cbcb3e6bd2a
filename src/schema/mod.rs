//! Schema subsystem for treeschema
//!
//! A model document is normalized once into an immutable schema tree. Nodes
//! are addressed by key path and are never mutated after construction.
//!
//! # Design Principles
//!
//! - Models are rejected whole at build time (INVALID_SCHEMA)
//! - Validation is fail-fast and never mutates data
//! - Casting validates, coerces, then re-validates
//! - Bound objects keep data and schema in sync on every write
//! - Hook tables are per cast, never shared

mod bound;
mod cast;
mod errors;
mod loader;
mod normalizer;
mod tree;
mod types;
mod validator;

pub use bound::{BoundMut, BoundObject};
pub use cast::{Cast, HookEntry, HookTable};
pub use errors::{SchemaError, SchemaErrorKind, SchemaResult, ViolationDetails};
pub use loader::ModelLoader;
pub use normalizer::{validate_model, RESERVED_NAMES};
pub use tree::{Method, NodeKind, Schema, SchemaBuilder, SchemaNode};
pub use types::{
    is_container, is_truthy, type_of, KeyPath, NamedTransform, PrimitiveKind, Transform,
    ValueSchema, VALUE_OPTIONS,
};
pub use validator::{validate, SchemaValidator, ValidateOptions};
