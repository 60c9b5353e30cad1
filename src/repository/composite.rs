// src/repository/composite.rs

//! Composite source views
//!
//! A composite view presents several source repositories as one read-only
//! repository. It lives only in memory and is never registered. Children are loaded
//! lazily on first query, through the run's [`RegistrationTracker`], so their
//! registrations are released with everything else the run touched. A child that
//! fails to load is skipped and reported by [`load_problems`](CompositeArtifactView::load_problems).

use super::{
    ArtifactDescriptor, ArtifactRepository, LoadFlags, MetadataRepository, RegistrationTracker,
    Repository, RepositoryLocation,
};
use crate::error::{Error, Result};
use crate::status::Status;
use crate::unit::{ArtifactKey, InstallableUnit};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};
use tracing::warn;

struct Loaded<R: ?Sized> {
    repositories: Vec<Arc<R>>,
    problems: Vec<Status>,
}

/// Child locations plus their lazily loaded repositories
struct Children<R: ?Sized> {
    locations: BTreeSet<RepositoryLocation>,
    loaded: OnceLock<Loaded<R>>,
}

impl<R: ?Sized> Children<R> {
    fn new() -> Self {
        Self {
            locations: BTreeSet::new(),
            loaded: OnceLock::new(),
        }
    }

    fn get(&self, load: impl Fn(&RepositoryLocation) -> Result<Arc<R>>) -> &Loaded<R> {
        self.loaded.get_or_init(|| {
            let mut repositories = Vec::new();
            let mut problems = Vec::new();
            for location in &self.locations {
                match load(location) {
                    Ok(repository) => repositories.push(repository),
                    Err(e) => {
                        warn!("Skipping source repository {}: {}", location, e);
                        problems.push(Status::warning(format!(
                            "Failed to load source repository {location}: {e}"
                        )));
                    }
                }
            }
            Loaded {
                repositories,
                problems,
            }
        })
    }
}

/// Read-only union of several artifact repositories
pub struct CompositeArtifactView {
    location: RepositoryLocation,
    tracker: Arc<RegistrationTracker>,
    children: Children<dyn ArtifactRepository>,
}

impl CompositeArtifactView {
    pub fn new(tracker: Arc<RegistrationTracker>) -> Result<Self> {
        Ok(Self {
            location: RepositoryLocation::memory("composite-artifacts")?,
            tracker,
            children: Children::new(),
        })
    }

    /// Add a child location; has no effect once the view has been queried
    pub fn add_child(&mut self, location: RepositoryLocation) {
        self.children.locations.insert(location);
    }

    /// Warnings for children that could not be loaded (loads them if needed)
    pub fn load_problems(&self) -> Vec<Status> {
        self.loaded().problems.clone()
    }

    fn loaded(&self) -> &Loaded<dyn ArtifactRepository> {
        self.children
            .get(|location| self.tracker.load_artifact(location, LoadFlags::NONE))
    }

    fn repositories(&self) -> &[Arc<dyn ArtifactRepository>] {
        &self.loaded().repositories
    }
}

impl Repository for CompositeArtifactView {
    fn location(&self) -> &RepositoryLocation {
        &self.location
    }

    fn name(&self) -> String {
        "Composite source artifacts".to_string()
    }

    fn is_modifiable(&self) -> bool {
        false
    }

    fn properties(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn set_property(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }
}

impl ArtifactRepository for CompositeArtifactView {
    fn contains(&self, key: &ArtifactKey) -> bool {
        self.repositories().iter().any(|repo| repo.contains(key))
    }

    fn keys(&self) -> Vec<ArtifactKey> {
        let keys: BTreeSet<_> = self
            .repositories()
            .iter()
            .flat_map(|repo| repo.keys())
            .collect();
        keys.into_iter().collect()
    }

    /// Descriptors of the first child that has the key
    fn descriptors(&self, key: &ArtifactKey) -> Vec<ArtifactDescriptor> {
        self.repositories()
            .iter()
            .map(|repo| repo.descriptors(key))
            .find(|descriptors| !descriptors.is_empty())
            .unwrap_or_default()
    }

    /// Read from the first child that serves the payload
    fn read(&self, descriptor: &ArtifactDescriptor) -> Result<Vec<u8>> {
        let mut last_error = None;
        for repo in self.repositories() {
            if !repo.contains(&descriptor.key) {
                continue;
            }
            match repo.read(descriptor) {
                Ok(content) => return Ok(content),
                Err(e) => {
                    warn!("Reading {} from {} failed: {}", descriptor, repo.location(), e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::ArtifactNotFound(descriptor.to_string())))
    }

    fn write(&self, _descriptor: &ArtifactDescriptor, _content: &[u8]) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }

    fn remove_all(&self) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }
}

/// Read-only union of several metadata repositories
pub struct CompositeMetadataView {
    location: RepositoryLocation,
    tracker: Arc<RegistrationTracker>,
    children: Children<dyn MetadataRepository>,
}

impl CompositeMetadataView {
    pub fn new(tracker: Arc<RegistrationTracker>) -> Result<Self> {
        Ok(Self {
            location: RepositoryLocation::memory("composite-metadata")?,
            tracker,
            children: Children::new(),
        })
    }

    pub fn add_child(&mut self, location: RepositoryLocation) {
        self.children.locations.insert(location);
    }

    pub fn load_problems(&self) -> Vec<Status> {
        self.loaded().problems.clone()
    }

    fn loaded(&self) -> &Loaded<dyn MetadataRepository> {
        self.children
            .get(|location| self.tracker.load_metadata(location, LoadFlags::NONE))
    }

    fn repositories(&self) -> &[Arc<dyn MetadataRepository>] {
        &self.loaded().repositories
    }
}

impl Repository for CompositeMetadataView {
    fn location(&self) -> &RepositoryLocation {
        &self.location
    }

    fn name(&self) -> String {
        "Composite source metadata".to_string()
    }

    fn is_modifiable(&self) -> bool {
        false
    }

    fn properties(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn set_property(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }
}

impl MetadataRepository for CompositeMetadataView {
    fn units(&self) -> Vec<InstallableUnit> {
        let units: BTreeSet<_> = self
            .repositories()
            .iter()
            .flat_map(|repo| repo.units())
            .collect();
        units.into_iter().collect()
    }

    fn contains_unit(&self, unit: &InstallableUnit) -> bool {
        self.repositories().iter().any(|repo| repo.contains_unit(unit))
    }

    fn add_units(&self, _units: &[InstallableUnit]) -> Result<usize> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }

    fn remove_all(&self) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }
}

/// The pair of composite views over a run's source repositories
pub struct SourceView {
    pub artifacts: CompositeArtifactView,
    pub metadata: CompositeMetadataView,
}

impl SourceView {
    /// Build both views over `sources`; nothing is loaded until first queried
    pub fn build<'a>(
        tracker: &Arc<RegistrationTracker>,
        sources: impl IntoIterator<Item = &'a RepositoryLocation>,
    ) -> Result<Self> {
        let mut artifacts = CompositeArtifactView::new(Arc::clone(tracker))?;
        let mut metadata = CompositeMetadataView::new(Arc::clone(tracker))?;
        for location in sources {
            artifacts.add_child(location.clone());
            metadata.add_child(location.clone());
        }
        Ok(Self {
            artifacts,
            metadata,
        })
    }

    /// Load warnings of both views
    pub fn load_problems(&self) -> Vec<Status> {
        let mut problems = self.artifacts.load_problems();
        problems.extend(self.metadata.load_problems());
        problems
    }
}
