// src/commands/export.rs
//! Batch export command

use super::{check_problems, print_status};
use anyhow::Result;
use std::path::Path;
use tpexport::{
    BatchConfig, CancellationToken, CliProgress, DirectoryExporter, ExportBatch, ExportOutcome,
    ProvisioningContext, ResolvedTargetFile,
};
use tracing::info;

/// Run the export batch described in `batch_path`
pub fn cmd_export(batch_path: &Path, verbose: bool) -> Result<()> {
    let batch = BatchConfig::load(batch_path)?;
    info!(
        "Exporting {} targets for {} configurations to {}",
        batch.targets.len(),
        batch.configurations.len(),
        batch.destination
    );

    let context = ProvisioningContext::with_default_provider();
    let exporter = DirectoryExporter::new(context.acquire_agent()?);
    let progress = CliProgress::new("Exporting target platforms", 0);

    let outcome = ExportBatch::new(&context).run(
        &batch,
        &ResolvedTargetFile,
        &exporter,
        &progress,
        &CancellationToken::new(),
    )?;

    match &outcome {
        ExportOutcome::Mirrored(status) => print_status(status, verbose),
        ExportOutcome::Exported { configurations } => {
            println!("Exported {} configuration(s) to {}", configurations, batch.destination);
        }
    }
    check_problems(&outcome.problems())
}
