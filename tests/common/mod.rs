// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tpexport::repository::{
    ArtifactRepositoryManager, LoadFlags, MetadataRepositoryManager, RepositoryFactory,
    RepositoryKind, RepositoryManager, SimpleArtifactRepository, SimpleMetadataRepository,
    SimpleMetadataRepositoryFactory,
};
use tpexport::{
    Agent, ArtifactDescriptor, ArtifactKey, ArtifactRepository, CancellationToken,
    InstallableUnit, MetadataRepository, ProgressTracker, Repository, RepositoryLocation,
    RepositorySide, Result, SilentProgress,
};

/// Unit `id@version` referencing the bundle artifact of the same name
pub fn bundle_unit(id: &str, version: &str) -> InstallableUnit {
    InstallableUnit::new(id, version).with_artifact(ArtifactKey::bundle(id, version))
}

/// Create a simple source repository pair under `parent/name`
///
/// Every unit's artifacts are stored with the artifact id as content.
pub fn create_source(parent: &Path, name: &str, units: &[InstallableUnit]) -> RepositoryLocation {
    let location = RepositoryLocation::from_path(&parent.join(name)).unwrap();
    let artifacts = SimpleArtifactRepository::create(&location, name, &BTreeMap::new()).unwrap();
    let metadata = SimpleMetadataRepository::create(&location, name, &BTreeMap::new()).unwrap();

    for unit in units {
        for key in &unit.artifacts {
            artifacts
                .write(&ArtifactDescriptor::new(key.clone()), key.id.as_bytes())
                .unwrap();
        }
    }
    metadata.add_units(units).unwrap();
    location
}

/// Location of a not yet existing folder under `parent`
pub fn destination(parent: &Path, name: &str) -> (RepositoryLocation, String) {
    let path = parent.join(name);
    let location = RepositoryLocation::from_path(&path).unwrap();
    (location, path.to_string_lossy().into_owned())
}

pub fn open_artifacts(location: &RepositoryLocation) -> SimpleArtifactRepository {
    SimpleArtifactRepository::open(location).unwrap()
}

pub fn open_metadata(location: &RepositoryLocation) -> SimpleMetadataRepository {
    SimpleMetadataRepository::open(location).unwrap()
}

/// True when neither registry of `agent` knows any of `locations`
pub fn none_registered(agent: &Agent, locations: &[&RepositoryLocation]) -> bool {
    locations.iter().all(|location| {
        !agent.artifact_manager().contains(location) && !agent.metadata_manager().contains(location)
    })
}

/// Simple artifact repository that reports itself as not modifiable
pub struct ReadOnlyArtifacts(SimpleArtifactRepository);

impl Repository for ReadOnlyArtifacts {
    fn location(&self) -> &RepositoryLocation {
        self.0.location()
    }

    fn name(&self) -> String {
        self.0.name()
    }

    fn is_modifiable(&self) -> bool {
        false
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.0.properties()
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.0.set_property(key, value)
    }
}

impl ArtifactRepository for ReadOnlyArtifacts {
    fn contains(&self, key: &ArtifactKey) -> bool {
        self.0.contains(key)
    }

    fn keys(&self) -> Vec<ArtifactKey> {
        self.0.keys()
    }

    fn descriptors(&self, key: &ArtifactKey) -> Vec<ArtifactDescriptor> {
        self.0.descriptors(key)
    }

    fn read(&self, descriptor: &ArtifactDescriptor) -> Result<Vec<u8>> {
        self.0.read(descriptor)
    }

    fn write(&self, descriptor: &ArtifactDescriptor, content: &[u8]) -> Result<()> {
        self.0.write(descriptor, content)
    }

    fn remove_all(&self) -> Result<()> {
        self.0.remove_all()
    }
}

pub struct ReadOnlyArtifactFactory;

impl RepositoryFactory<dyn ArtifactRepository> for ReadOnlyArtifactFactory {
    fn supports(&self, location: &RepositoryLocation) -> bool {
        location.is_local()
    }

    fn load(
        &self,
        location: &RepositoryLocation,
        _flags: LoadFlags,
    ) -> Result<Arc<dyn ArtifactRepository>> {
        Ok(Arc::new(ReadOnlyArtifacts(SimpleArtifactRepository::open(location)?)))
    }

    fn create(
        &self,
        location: &RepositoryLocation,
        name: &str,
        _kind: RepositoryKind,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn ArtifactRepository>> {
        Ok(Arc::new(ReadOnlyArtifacts(SimpleArtifactRepository::create(
            location, name, properties,
        )?)))
    }
}

/// Agent whose artifact repositories are all read-only
pub fn read_only_agent() -> Agent {
    let artifacts: ArtifactRepositoryManager = RepositoryManager::new(RepositorySide::Artifact)
        .with_factory(Arc::new(ReadOnlyArtifactFactory));
    let metadata: MetadataRepositoryManager = RepositoryManager::new(RepositorySide::Metadata)
        .with_factory(Arc::new(SimpleMetadataRepositoryFactory));
    Agent::new(artifacts, metadata)
}

/// Progress tracker that cancels `token` once the artifact copy has processed every key
///
/// This lands the cancellation between artifact copy and metadata merge.
pub struct CancelAfterCopy {
    token: CancellationToken,
    inner: SilentProgress,
}

impl CancelAfterCopy {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            inner: SilentProgress::new(),
        }
    }
}

impl ProgressTracker for CancelAfterCopy {
    fn set_message(&self, message: &str) {
        self.inner.set_message(message);
    }

    fn increment(&self, amount: u64) {
        self.inner.increment(amount);
    }

    fn set_length(&self, length: u64) {
        self.inner.set_length(length);
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn finish_with_message(&self, message: &str) {
        self.inner.finish_with_message(message);
    }

    fn finish_with_error(&self, message: &str) {
        self.inner.finish_with_error(message);
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    fn child(&self, _message: &str, length: u64) -> Box<dyn ProgressTracker> {
        Box::new(CancelOnComplete {
            token: self.token.clone(),
            inner: SilentProgress::with_length(length),
        })
    }
}

struct CancelOnComplete {
    token: CancellationToken,
    inner: SilentProgress,
}

impl ProgressTracker for CancelOnComplete {
    fn set_message(&self, message: &str) {
        self.inner.set_message(message);
    }

    fn increment(&self, amount: u64) {
        self.inner.increment(amount);
        if self.inner.position() >= self.inner.length() {
            self.token.cancel();
        }
    }

    fn set_length(&self, length: u64) {
        self.inner.set_length(length);
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn finish_with_message(&self, message: &str) {
        self.inner.finish_with_message(message);
    }

    fn finish_with_error(&self, message: &str) {
        self.inner.finish_with_error(message);
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    fn child(&self, message: &str, length: u64) -> Box<dyn ProgressTracker> {
        self.inner.child(message, length)
    }
}
