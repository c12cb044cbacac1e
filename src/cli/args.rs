//! Defines the command-line arguments and subcommands for the Keel CLI.
//!
//! Every subcommand reads a program as JSON: one serialized term, or an
//! array of terms run in sequence.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::macros::MAX_EXPANSION_DEPTH;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "keel",
    version,
    about = "Lowers pattern-aware surface constructs into a primitive core calculus."
)]
pub struct KeelArgs {
    /// Maximum nesting of lowering steps before expansion fails.
    #[arg(long, global = true, default_value_t = MAX_EXPANSION_DEPTH)]
    pub max_depth: usize,

    /// Enclosing module, required by `defdelegate` and used for `def`.
    #[arg(long, global = true)]
    pub module: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the fully expanded term.
    Expand {
        /// The path to the JSON program to expand.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Show each expansion step with diffs.
    Trace {
        /// The path to the JSON program to trace.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Expand, then evaluate, and print the value.
    Eval {
        /// The path to the JSON program to evaluate.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Pretty-print the unexpanded term.
    Ast {
        /// The path to the JSON program to print.
        #[arg(required = true)]
        file: PathBuf,
    },
}

impl Command {
    pub fn file(&self) -> &PathBuf {
        match self {
            Command::Expand { file }
            | Command::Trace { file }
            | Command::Eval { file }
            | Command::Ast { file } => file,
        }
    }
}
