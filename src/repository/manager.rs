// src/repository/manager.rs

//! Repository registries
//!
//! A [`RepositoryManager`] is the process-wide registry of known repositories of one
//! kind. It maps locations to loaded instances and picks a [`RepositoryFactory`] to
//! load or create a repository the first time a location is used. Entries stay
//! registered until they are explicitly removed.

use super::{
    ArtifactRepository, LoadFlags, MetadataRepository, RepositoryKind, RepositoryLocation,
};
use crate::error::{Error, RepositorySide, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Loads and creates repositories for the locations it supports
pub trait RepositoryFactory<R: ?Sized>: Send + Sync {
    /// Whether this factory handles `location` at all
    fn supports(&self, location: &RepositoryLocation) -> bool;

    /// Open an existing repository; fails with `RepositoryNotFound` if there is none
    fn load(&self, location: &RepositoryLocation, flags: LoadFlags) -> Result<Arc<R>>;

    /// Create an empty repository; fails with `AlreadyExists` if one is present
    fn create(
        &self,
        location: &RepositoryLocation,
        name: &str,
        kind: RepositoryKind,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<R>>;
}

/// Registry of known repositories of one kind
pub struct RepositoryManager<R: ?Sized> {
    side: RepositorySide,
    factories: Vec<Arc<dyn RepositoryFactory<R>>>,
    /// Known locations; `None` until the repository is first loaded
    known: RwLock<BTreeMap<RepositoryLocation, Option<Arc<R>>>>,
}

pub type ArtifactRepositoryManager = RepositoryManager<dyn ArtifactRepository>;
pub type MetadataRepositoryManager = RepositoryManager<dyn MetadataRepository>;

impl<R: ?Sized> RepositoryManager<R> {
    pub fn new(side: RepositorySide) -> Self {
        Self {
            side,
            factories: Vec::new(),
            known: RwLock::new(BTreeMap::new()),
        }
    }

    /// Builder-style helper to register a factory; earlier factories win
    pub fn with_factory(mut self, factory: Arc<dyn RepositoryFactory<R>>) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn contains(&self, location: &RepositoryLocation) -> bool {
        self.known.read().contains_key(location)
    }

    /// Register a location without loading it; returns false if it was already known
    pub fn add_repository(&self, location: &RepositoryLocation) -> bool {
        let mut known = self.known.write();
        if known.contains_key(location) {
            return false;
        }
        known.insert(location.clone(), None);
        true
    }

    /// Forget a location and drop the cached instance; returns false if it was unknown
    pub fn remove_repository(&self, location: &RepositoryLocation) -> bool {
        let removed = self.known.write().remove(location).is_some();
        if removed {
            debug!("Unregistered {} repository {}", self.side, location);
        }
        removed
    }

    pub fn known_repositories(&self) -> Vec<RepositoryLocation> {
        self.known.read().keys().cloned().collect()
    }

    /// Return the cached repository or load it through a factory and register it
    pub fn load_repository(&self, location: &RepositoryLocation, flags: LoadFlags) -> Result<Arc<R>> {
        if let Some(Some(repository)) = self.known.read().get(location) {
            return Ok(Arc::clone(repository));
        }

        let factory = self.factory_for(location)?;
        let repository = factory.load(location, flags)?;
        debug!("Loaded {} repository {}", self.side, location);

        self.known
            .write()
            .insert(location.clone(), Some(Arc::clone(&repository)));
        Ok(repository)
    }

    /// Create a new repository through a factory and register it
    pub fn create_repository(
        &self,
        location: &RepositoryLocation,
        name: &str,
        kind: RepositoryKind,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<R>> {
        let factory = self.factory_for(location)?;
        let repository = factory.create(location, name, kind, properties)?;
        info!("Created {} repository '{}' at {}", self.side, name, location);

        self.known
            .write()
            .insert(location.clone(), Some(Arc::clone(&repository)));
        Ok(repository)
    }

    fn factory_for(&self, location: &RepositoryLocation) -> Result<&Arc<dyn RepositoryFactory<R>>> {
        self.factories
            .iter()
            .find(|factory| factory.supports(location))
            .ok_or_else(|| Error::UnsupportedLocation(location.to_string()))
    }
}
