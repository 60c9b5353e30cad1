// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Mirror {
            sources,
            units,
            dest,
            options,
            no_append,
            validate,
        } => commands::cmd_mirror(
            &sources,
            units.as_deref(),
            &dest,
            options.as_deref(),
            no_append,
            validate,
            cli.verbose,
        ),
        Commands::Export { batch } => commands::cmd_export(&batch, cli.verbose),
        Commands::Platform => commands::cmd_platform(),
    }
}
