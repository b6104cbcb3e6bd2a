//! CLI module for treeschema
//!
//! Provides command-line interface for:
//! - check: Normalize a model file
//! - validate: Validate a data document read from stdin
//! - cast: Cast a data document read from stdin
//! - inspect: Describe a schema node

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, Target};
pub use commands::{cast, check, inspect, run, run_command, validate};
pub use errors::{CliError, CliResult};
pub use io::{read_request, write_error, write_response};
