// src/commands/mod.rs
//! Command handlers for the tpexport CLI

mod export;
mod mirror;

pub use export::cmd_export;
pub use mirror::{cmd_mirror, cmd_platform};

use tpexport::status::{Severity, Status};

/// Print a status tree, hiding informational leaves unless `verbose`
fn print_status(status: &Status, verbose: bool) {
    print_node(status, 0, verbose);
}

fn print_node(status: &Status, depth: usize, verbose: bool) {
    if !verbose && depth > 0 && status.severity() <= Severity::Info {
        return;
    }
    println!("{:indent$}[{}] {}", "", status.severity(), status.message(), indent = depth * 2);
    for child in status.children() {
        print_node(child, depth + 1, verbose);
    }
}

/// Fail the command when the status carries problems
fn check_problems(problems: &[String]) -> anyhow::Result<()> {
    if problems.is_empty() {
        return Ok(());
    }
    println!();
    println!("{} problem(s):", problems.len());
    for problem in problems {
        println!("  {}", problem);
    }
    anyhow::bail!("Completed with {} problem(s)", problems.len())
}
