//! Handles all user-facing output for the CLI.
//!
//! Pretty-printing, colored trace diffs and error reports live here so every
//! subcommand presents results the same way.

use difference::{Changeset, Difference};
use miette::Report;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::macros::{MacroExpansionStep, MacroProvenance};
use crate::runtime::value::Value;
use crate::KeelError;

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Prints an expansion trace: each step as a line diff of its input and output.
pub fn print_trace(trace: &[MacroExpansionStep]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    if trace.is_empty() {
        println!("(no expansion steps)");
        return;
    }

    for (i, step) in trace.iter().enumerate() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        println!(
            "--- Step {}: {} ({}) ---",
            i,
            step.construct,
            provenance_label(&step.provenance)
        );
        let _ = stdout.reset();

        let before = step.input.pretty();
        let after = step.output.pretty();
        let changeset = Changeset::new(&before, &after, "\n");
        print_diff(&mut stdout, &changeset.diffs);
        let _ = stdout.reset();
        println!();
    }
}

/// Prints an evaluation result.
pub fn print_result(value: &Value) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    println!("{}", value);
    let _ = stdout.reset();
}

/// Renders an error as a miette report on stderr.
pub fn print_error(error: KeelError) {
    eprintln!("{:?}", Report::new(error));
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn provenance_label(provenance: &MacroProvenance) -> &'static str {
    match provenance {
        MacroProvenance::Core => "core",
        MacroProvenance::User => "user",
    }
}

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(x) => {
                let _ = stdout.reset();
                println!(" {}", x);
            }
            Difference::Add(x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                println!("+{}", x);
            }
            Difference::Rem(x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                println!("-{}", x);
            }
        }
    }
}
