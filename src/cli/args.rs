//! CLI argument definitions using clap
//!
//! Commands:
//! - treeschema check --model <file>
//! - treeschema validate --model <file> [--path a.b] [--ignore-required]
//! - treeschema cast --model <file> [--path a.b]
//! - treeschema inspect --model <file> [--path a.b]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// treeschema - schema trees, validation and casting for nested data
#[derive(Parser, Debug)]
#[command(name = "treeschema")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Model file and the node to operate on
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Path to the model document
    #[arg(long)]
    pub model: PathBuf,

    /// Dot-delimited key path of the node, root when empty
    #[arg(long, default_value = "")]
    pub path: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that a model normalizes
    Check {
        /// Path to the model document
        #[arg(long)]
        model: PathBuf,
    },

    /// Validate stdin data against a node
    Validate {
        #[command(flatten)]
        target: Target,

        /// Do not report REQUIRED violations
        #[arg(long)]
        ignore_required: bool,
    },

    /// Validate and coerce stdin data against a node
    Cast {
        #[command(flatten)]
        target: Target,
    },

    /// Print the description of a node
    Inspect {
        #[command(flatten)]
        target: Target,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
