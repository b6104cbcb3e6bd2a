//! treeschema - schema trees, validation and casting for nested key-value data
//!
//! Models are plain JSON documents. A model is normalized into a schema tree
//! whose nodes validate data, cast it into canonical form, and bind the
//! result so later writes stay valid.

pub mod cli;
pub mod observability;
pub mod schema;
