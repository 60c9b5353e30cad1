// src/mirror/mod.rs

//! Repository mirroring
//!
//! A mirror run copies the artifacts referenced by a set of installable units from
//! one or more source repositories into a destination repository pair, then merges
//! the units into the destination's metadata. Runs go through these phases:
//!
//! ```text
//! InitAgent -> InitSources -> InitDestination -> CopyArtifacts -> MergeMetadata -> Done
//!      \             \               \                  \                \
//!       +-------------+---------------+------------------+----------------+-> Cleanup
//! ```
//!
//! The destination lock (see [`crate::lock`]) is taken before the destination is
//! loaded. Cleanup always runs. It unregisters every repository the run registered and
//! then releases the destination lock, whether the run succeeded, failed or was
//! cancelled.

mod copy;

pub use copy::ArtifactMirror;

use crate::agent::ProvisioningContext;
use crate::config::MirrorOptions;
use crate::error::{Error, RepositorySide, Result};
use crate::progress::{CancellationToken, ProgressTracker};
use crate::repository::{
    ArtifactRepository, LoadFlags, MetadataRepository, PROP_ATOMIC, PROP_COMPRESSED,
    RegistrationTracker, RepositoryKind, RepositoryLocation, SourceView,
};
use crate::status::{MultiStatus, Status};
use crate::unit::{InstallableUnit, collect_artifact_keys};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Progress units per phase
const WORK_AGENT: u64 = 1;
const WORK_SOURCES: u64 = 1;
const WORK_DESTINATION: u64 = 2;
const WORK_ARTIFACTS: u64 = 3;
const WORK_METADATA: u64 = 1;

/// Total progress units of a run
pub const TOTAL_WORK: u64 =
    WORK_AGENT + WORK_SOURCES + WORK_DESTINATION + WORK_ARTIFACTS + WORK_METADATA;

/// Phases of a mirror run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorPhase {
    InitAgent,
    InitSources,
    InitDestination,
    CopyArtifacts,
    MergeMetadata,
    Done,
    Cleanup,
}

impl fmt::Display for MirrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MirrorPhase::InitAgent => "init-agent",
            MirrorPhase::InitSources => "init-sources",
            MirrorPhase::InitDestination => "init-destination",
            MirrorPhase::CopyArtifacts => "copy-artifacts",
            MirrorPhase::MergeMetadata => "merge-metadata",
            MirrorPhase::Done => "done",
            MirrorPhase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// What to mirror and where
#[derive(Debug, Clone, Default)]
pub struct MirrorRequest {
    pub sources: BTreeSet<RepositoryLocation>,
    /// Units whose artifacts are copied; empty means every artifact of every source
    pub units: BTreeSet<InstallableUnit>,
    /// Destination folder as given by the user (path or URI)
    pub destination: String,
}

impl MirrorRequest {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, location: RepositoryLocation) -> Self {
        self.sources.insert(location);
        self
    }

    pub fn with_unit(mut self, unit: InstallableUnit) -> Self {
        self.units.insert(unit);
        self
    }
}

/// Destination repository pair of a run
struct Destination {
    artifacts: Arc<dyn ArtifactRepository>,
    metadata: Arc<dyn MetadataRepository>,
}

/// Mirror operation bound to a provisioning context
pub struct MirrorOperation<'a> {
    context: &'a ProvisioningContext,
    options: MirrorOptions,
}

impl<'a> MirrorOperation<'a> {
    pub fn new(context: &'a ProvisioningContext, options: MirrorOptions) -> Self {
        Self { context, options }
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// Run the mirror
    ///
    /// Returns the copy status tree, which may carry per-artifact errors even though
    /// the run as a whole succeeded. Fatal conditions and cancellation are errors.
    pub fn mirror(
        &self,
        request: &MirrorRequest,
        progress: &dyn ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<Status> {
        progress.set_length(TOTAL_WORK);
        progress.set_message("Creating p2 repository");

        let result = self.run(request, progress, cancel);
        match &result {
            Ok(status) if status.problems().is_empty() => {
                progress.finish_with_message("Mirror complete")
            }
            Ok(_) => progress.finish_with_message("Mirror complete with problems"),
            Err(e) => progress.finish_with_error(&e.to_string()),
        }
        result
    }

    fn run(
        &self,
        request: &MirrorRequest,
        progress: &dyn ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<Status> {
        enter(MirrorPhase::InitAgent, progress, "Initializing provisioning agent");
        let agent = self.context.acquire_agent()?;
        progress.increment(WORK_AGENT);

        let tracker = Arc::new(RegistrationTracker::new(Arc::clone(&agent)));
        let _cleanup = tracker.guard();

        enter(MirrorPhase::InitSources, progress, "Preparing source repositories");
        let sources = SourceView::build(&tracker, &request.sources)?;
        progress.increment(WORK_SOURCES);

        enter(MirrorPhase::InitDestination, progress, "Preparing destination repository");
        let location = RepositoryLocation::from_destination(&request.destination)?;
        let lock = agent
            .locks()
            .acquire_exclusive(&location)
            .map_err(|e| Error::DestinationInit {
                side: RepositorySide::Artifact,
                location: location.to_string(),
                source: Box::new(e),
            })?;
        tracker.hold(lock);
        let destination = self.init_destination(&tracker, &location, progress)?;

        if cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }

        enter(MirrorPhase::CopyArtifacts, progress, "Mirroring artifacts");
        let keys = collect_artifact_keys(&request.units);
        let mut copier = ArtifactMirror::new(&sources.artifacts, destination.artifacts.as_ref())
            .validate(self.options.validate)
            .include_packed(self.options.include_packed)
            .verbose(self.options.verbose);
        if !keys.is_empty() {
            copier = copier.with_keys(keys);
        }
        let copy_progress = progress.child("Mirroring artifacts", 0);
        let copy_status = copier.run(copy_progress.as_ref(), cancel);
        progress.increment(WORK_ARTIFACTS);

        let mut result = MultiStatus::new(format!("Mirroring into {location}"));
        for problem in sources.artifacts.load_problems() {
            result.add(problem);
        }
        result.add(copy_status);

        if cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }

        enter(MirrorPhase::MergeMetadata, progress, "Mirroring metadata");
        let units: Vec<InstallableUnit> = request.units.iter().cloned().collect();
        let added = destination.metadata.add_units(&units)?;
        info!("Added {} of {} units to {}", added, units.len(), location);
        progress.increment(WORK_METADATA);

        debug!("Mirror phase: {}", MirrorPhase::Done);
        Ok(result.finish())
    }

    /// Open or create both destination repositories and prepare them for writing
    fn init_destination(
        &self,
        tracker: &RegistrationTracker,
        location: &RepositoryLocation,
        progress: &dyn ProgressTracker,
    ) -> Result<Destination> {
        let agent = tracker.agent();
        let properties = self.creation_properties();
        let name = self.options.repository_name.as_str();

        let artifacts = load_or_create(RepositorySide::Artifact, location, || {
            tracker.load_artifact(location, LoadFlags::MODIFIABLE)
        }, || {
            agent
                .artifact_manager()
                .create_repository(location, name, RepositoryKind::Simple, &properties)
        })?;
        progress.increment(1);

        let metadata = load_or_create(RepositorySide::Metadata, location, || {
            tracker.load_metadata(location, LoadFlags::MODIFIABLE)
        }, || {
            agent
                .metadata_manager()
                .create_repository(location, name, RepositoryKind::Simple, &properties)
        })?;
        progress.increment(WORK_DESTINATION - 1);

        if !artifacts.is_modifiable() || !metadata.is_modifiable() {
            return Err(Error::NotModifiable(location.to_string()));
        }

        if !self.options.append {
            info!("Emptying destination {}", location);
            artifacts.remove_all()?;
            metadata.remove_all()?;
        }

        let compressed = self.options.compressed.to_string();
        artifacts.set_property(PROP_COMPRESSED, &compressed)?;
        metadata.set_property(PROP_COMPRESSED, &compressed)?;

        Ok(Destination {
            artifacts,
            metadata,
        })
    }

    fn creation_properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        properties.insert(PROP_COMPRESSED.to_string(), self.options.compressed.to_string());
        properties.insert(PROP_ATOMIC.to_string(), self.options.atomic.to_string());
        properties
    }
}

fn enter(phase: MirrorPhase, progress: &dyn ProgressTracker, message: &str) {
    debug!("Mirror phase: {}", phase);
    progress.set_message(message);
}

/// Load a destination repository, creating it when loading fails
fn load_or_create<R: ?Sized>(
    side: RepositorySide,
    location: &RepositoryLocation,
    load: impl FnOnce() -> Result<Arc<R>>,
    create: impl FnOnce() -> Result<Arc<R>>,
) -> Result<Arc<R>> {
    match load() {
        Ok(repository) => {
            debug!("Using existing {} repository at {}", side, location);
            Ok(repository)
        }
        Err(load_error) => {
            debug!("No usable {} repository at {}: {}", side, location, load_error);
            create().map_err(|e| Error::DestinationInit {
                side,
                location: location.to_string(),
                source: Box::new(e),
            })
        }
    }
}
