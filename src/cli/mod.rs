//! The Keel Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions. It is the only part of the crate that does I/O.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Command, KeelArgs};
use crate::engine::ExecutionPipeline;
use crate::macros::ExpansionConfig;
use crate::KeelError;

pub mod args;
pub mod output;

/// Environment variable holding the log filter, e.g. `KEEL_LOG=keel=trace`.
pub const LOG_ENV: &str = "KEEL_LOG";

/// The main entry point for the CLI.
pub fn run() {
    init_logging();
    let args = KeelArgs::parse();

    if let Err(e) = dispatch(&args) {
        output::print_error(e);
        process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn dispatch(args: &KeelArgs) -> Result<(), KeelError> {
    let path = args.command.file();
    let (text, program) = ExecutionPipeline::read_file(path)?;
    let name = path.display().to_string();

    let mut pipeline = ExecutionPipeline::default().with_config(ExpansionConfig {
        max_depth: args.max_depth,
        trace: matches!(args.command, Command::Trace { .. }),
    });
    if let Some(module) = &args.module {
        pipeline = pipeline.with_module(module.clone());
    }

    let result = match &args.command {
        Command::Ast { .. } => {
            println!("{}", program.pretty());
            Ok(())
        }
        Command::Expand { .. } => pipeline.expand(program).map(|expanded| {
            println!("{}", expanded.pretty());
        }),
        Command::Trace { .. } => pipeline.expand(program).map(|expanded| {
            output::print_trace(pipeline.trace());
            println!("{}", expanded.pretty());
        }),
        Command::Eval { .. } => pipeline
            .execute(program)
            .map(|value| output::print_result(&value)),
    };
    result.map_err(|e| e.with_source(&name, &text))
}
