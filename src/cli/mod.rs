// src/cli/mod.rs
//! CLI definitions for tpexport
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `mirror` - Mirror units and artifacts from source repositories into a p2 repository
//! - `export` - Run an export batch described in a TOML file
//! - `platform` - Show the configuration of the running platform

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tpexport")]
#[command(version)]
#[command(about = "Export Eclipse target platforms into p2 repositories", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror units and their artifacts into a destination repository
    Mirror {
        /// Source repository (path or URI); repeat for several sources
        #[arg(short, long = "source", required = true)]
        sources: Vec<String>,

        /// JSON file with the installable units to mirror (default: everything)
        #[arg(short, long)]
        units: Option<PathBuf>,

        /// Destination folder or URI
        #[arg(short, long)]
        dest: String,

        /// TOML file with mirror options
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Empty an existing destination before mirroring
        #[arg(long)]
        no_append: bool,

        /// Re-read every copied artifact from the destination
        #[arg(long)]
        validate: bool,
    },

    /// Run an export batch
    Export {
        /// Batch file (TOML)
        #[arg(short, long)]
        batch: PathBuf,
    },

    /// Show the configuration (os/ws/arch) of this platform
    Platform,
}
