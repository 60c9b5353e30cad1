// src/export.rs

//! Batch export of target platforms
//!
//! An export batch takes every target definition × platform configuration
//! combination, resolves it into units and source repositories, and then either
//! mirrors the union of all of them into one p2 repository or hands each combination
//! to a [`ConfigurationExporter`].
//!
//! Target resolution is pluggable through [`TargetResolver`]. The built-in
//! [`ResolvedTargetFile`] reads targets that were resolved ahead of time into JSON:
//!
//! ```json
//! {
//!   "configurations": {
//!     "linux/gtk/x86_64": { "units": [...], "repositories": ["https://..."] },
//!     "*": { "units": [...], "repositories": [...] }
//!   }
//! }
//! ```

use crate::agent::{Agent, ProvisioningContext};
use crate::config::{BatchConfig, PlatformConfig};
use crate::error::{Error, Result};
use crate::mirror::{MirrorOperation, MirrorRequest, TOTAL_WORK};
use crate::progress::{CancellationToken, ProgressTracker};
use crate::repository::{
    ArtifactRepository, RegistrationTracker, RepositoryLocation, SourceView, write_file,
};
use crate::status::Status;
use crate::unit::{InstallableUnit, collect_artifact_keys};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration key matching every platform
const ANY_CONFIGURATION: &str = "*";

/// A target definition resolved for one configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResolvedTarget {
    #[serde(default)]
    pub units: BTreeSet<InstallableUnit>,
    #[serde(default)]
    pub repositories: BTreeSet<RepositoryLocation>,
}

/// Resolves a target definition for a platform configuration
pub trait TargetResolver {
    fn resolve(&self, target: &Path, config: &PlatformConfig) -> Result<ResolvedTarget>;
}

/// Exports one resolved target/configuration combination
pub trait ConfigurationExporter {
    fn export(
        &self,
        target: &Path,
        config: &PlatformConfig,
        resolved: &ResolvedTarget,
        destination: &str,
    ) -> Result<()>;
}

/// Result of a batch
#[derive(Debug)]
pub enum ExportOutcome {
    /// Everything was mirrored into one repository
    Mirrored(Status),
    /// Each combination was handed to the exporter
    Exported { configurations: usize },
}

impl ExportOutcome {
    /// Problem messages to show the user; empty for a clean run
    pub fn problems(&self) -> Vec<String> {
        match self {
            ExportOutcome::Mirrored(status) => {
                status.problems().into_iter().map(str::to_string).collect()
            }
            ExportOutcome::Exported { .. } => Vec::new(),
        }
    }
}

/// Runs a [`BatchConfig`]
pub struct ExportBatch<'a> {
    context: &'a ProvisioningContext,
}

impl<'a> ExportBatch<'a> {
    pub fn new(context: &'a ProvisioningContext) -> Self {
        Self { context }
    }

    /// Validate the batch, resolve every combination, then mirror or export
    pub fn run(
        &self,
        batch: &BatchConfig,
        resolver: &dyn TargetResolver,
        exporter: &dyn ConfigurationExporter,
        progress: &dyn ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<ExportOutcome> {
        batch.validate()?;

        let combinations = batch.combinations() as u64;
        let mirror_work = if batch.p2_mirror { TOTAL_WORK } else { 0 };
        progress.set_length(combinations * 2 + mirror_work);

        let mut units = BTreeSet::new();
        let mut repositories = BTreeSet::new();
        let mut exported = 0;

        for target in &batch.targets {
            for config in &batch.configurations {
                if cancel.is_cancelled() {
                    progress.finish_with_error("Export cancelled");
                    return Err(Error::Interrupted);
                }

                progress.set_message(&format!("Resolving {} for {}", target.display(), config));
                let resolved = resolver.resolve(target, config)?;
                progress.increment(1);

                if batch.p2_mirror {
                    debug!(
                        "{} for {}: {} units from {} repositories",
                        target.display(),
                        config,
                        resolved.units.len(),
                        resolved.repositories.len()
                    );
                    units.extend(resolved.units);
                    repositories.extend(resolved.repositories);
                } else {
                    progress.set_message(&format!("Exporting {} for {}", target.display(), config));
                    exporter.export(target, config, &resolved, &batch.destination)?;
                    exported += 1;
                }
                progress.increment(1);
            }
        }

        if !batch.p2_mirror {
            progress.finish_with_message("Export complete");
            return Ok(ExportOutcome::Exported {
                configurations: exported,
            });
        }

        let request = MirrorRequest {
            sources: repositories,
            units,
            destination: batch.destination.clone(),
        };
        info!(
            "Mirroring {} units from {} repositories into {}",
            request.units.len(),
            request.sources.len(),
            request.destination
        );

        let mirror_progress = progress.child("Creating p2 repository", TOTAL_WORK);
        let status = MirrorOperation::new(self.context, batch.options.clone()).mirror(
            &request,
            mirror_progress.as_ref(),
            cancel,
        )?;
        progress.increment(TOTAL_WORK);
        progress.finish_with_message("Export complete");
        Ok(ExportOutcome::Mirrored(status))
    }
}

#[derive(Debug, Deserialize)]
struct ResolvedTargetDocument {
    #[serde(default)]
    configurations: BTreeMap<String, ResolvedTarget>,
}

/// Resolver reading pre-resolved targets from JSON files
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolvedTargetFile;

impl TargetResolver for ResolvedTargetFile {
    fn resolve(&self, target: &Path, config: &PlatformConfig) -> Result<ResolvedTarget> {
        let text = fs::read_to_string(target)?;
        let mut document: ResolvedTargetDocument = serde_json::from_str(&text)?;

        document
            .configurations
            .remove(&config.to_string())
            .or_else(|| document.configurations.remove(ANY_CONFIGURATION))
            .ok_or_else(|| {
                Error::Config(format!(
                    "Target {} has no resolution for {}",
                    target.display(),
                    config
                ))
            })
    }
}

/// Exporter copying each configuration's artifacts into
/// `<destination>/<os>.<ws>.<arch>/<plugins|features|binary>/`
pub struct DirectoryExporter {
    agent: Arc<Agent>,
}

impl DirectoryExporter {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }

    fn root(destination: &str, config: &PlatformConfig) -> Result<PathBuf> {
        let location = RepositoryLocation::from_destination(destination)?;
        let root = location
            .to_file_path()
            .ok_or_else(|| Error::UnsupportedLocation(location.to_string()))?;
        Ok(root.join(config.dir_name()))
    }
}

impl ConfigurationExporter for DirectoryExporter {
    fn export(
        &self,
        target: &Path,
        config: &PlatformConfig,
        resolved: &ResolvedTarget,
        destination: &str,
    ) -> Result<()> {
        let root = Self::root(destination, config)?;

        let tracker = Arc::new(RegistrationTracker::new(Arc::clone(&self.agent)));
        let _cleanup = tracker.guard();
        let sources = SourceView::build(&tracker, &resolved.repositories)?;

        let keys = collect_artifact_keys(&resolved.units);
        for key in &keys {
            let descriptor = sources
                .artifacts
                .descriptors(key)
                .into_iter()
                .find(|d| !d.is_packed())
                .ok_or_else(|| Error::ArtifactNotFound(key.to_string()))?;
            let content = sources.artifacts.read(&descriptor)?;
            descriptor.verify(&content)?;

            let path = root.join(descriptor.relative_path()?);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_file(&path, &content, true)?;
        }

        info!(
            "Exported {} artifacts of {} for {} to {}",
            keys.len(),
            target.display(),
            config,
            root.display()
        );
        Ok(())
    }
}
