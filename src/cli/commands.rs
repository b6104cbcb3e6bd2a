//! CLI command implementations
//!
//! Each command resolves its target node, runs one schema operation and
//! returns the response payload. `run_command` writes the envelope: the
//! payload on success, the error code and message on failure.

use std::path::Path;

use serde_json::{json, Value};

use crate::observability;
use crate::schema::{Cast, KeyPath, ModelLoader, Schema, SchemaError, SchemaNode, ValidateOptions};

use super::args::{Cli, Command, Target};
use super::errors::CliResult;
use super::io::{read_request, write_error, write_response};

/// Key path delimiter accepted by `--path`
const PATH_DELIMITER: &str = ".";

/// Parse arguments, install logging and run the command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    observability::init_logging(cli.verbose);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let result = match cmd {
        Command::Check { model } => check(&model),
        Command::Validate {
            target,
            ignore_required,
        } => read_request().and_then(|data| validate(&target, ignore_required, data)),
        Command::Cast { target } => read_request().and_then(|data| cast(&target, data)),
        Command::Inspect { target } => inspect(&target),
    };

    match result {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code(), &e.to_string())?;
            Err(e)
        }
    }
}

/// Normalize a model file and report its root kind
pub fn check(model_path: &Path) -> CliResult<Value> {
    let schema = load_schema(model_path)?;
    Ok(json!({
        "valid": true,
        "root": schema.root().kind().as_str(),
    }))
}

/// Validate `data` against the target node
pub fn validate(target: &Target, ignore_required: bool, data: Value) -> CliResult<Value> {
    let node = resolve_target(target)?;
    let options = ValidateOptions { ignore_required };
    node.validate_with(&data, options)?;

    Ok(json!({
        "valid": true,
        "keyPath": node.key_path(),
    }))
}

/// Cast `data` against the target node, returning the coerced value
pub fn cast(target: &Target, data: Value) -> CliResult<Value> {
    let node = resolve_target(target)?;
    let (bound, value) = match node.cast(data)? {
        Cast::Value(value) => (false, value),
        Cast::Bound(obj) => (true, obj.to_value()),
    };

    Ok(json!({
        "bound": bound,
        "value": value,
    }))
}

/// Describe the target node and its subtree
pub fn inspect(target: &Target) -> CliResult<Value> {
    let node = resolve_target(target)?;
    Ok(node.describe())
}

fn load_schema(model_path: &Path) -> CliResult<Schema> {
    let model = ModelLoader::read_model(model_path)?;
    Ok(Schema::new(model)?)
}

fn resolve_target(target: &Target) -> CliResult<SchemaNode> {
    let schema = load_schema(&target.model)?;
    let key_path = KeyPath::parse(&target.path, PATH_DELIMITER);
    let node = schema
        .node(key_path.iter())
        .ok_or_else(|| SchemaError::invalid_path(key_path.clone()))?;
    Ok(node)
}
