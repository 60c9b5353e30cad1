// src/repository/remote.rs

//! Read-only HTTP repositories
//!
//! A remote repository uses the same layout as a simple repository, served over
//! HTTP(S). The index is fetched once when the repository is loaded (compressed form
//! first); payloads are fetched on demand.

use super::{
    ArtifactDescriptor, ArtifactRepository, LoadFlags, MetadataRepository, Repository,
    RepositoryClient, RepositoryFactory, RepositoryKind, RepositoryLocation,
};
use crate::error::{Error, Result};
use crate::unit::{ArtifactKey, InstallableUnit};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct RemoteIndex<T> {
    name: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default = "Vec::new")]
    entries: Vec<T>,
}

fn fetch_index<T: DeserializeOwned>(
    client: &RepositoryClient,
    location: &RepositoryLocation,
    stem: &str,
) -> Result<RemoteIndex<T>> {
    let bytes = match client.fetch(&location.join(&format!("{stem}.json.zst"))?) {
        Ok(compressed) => zstd::decode_all(compressed.as_slice())?,
        Err(Error::RepositoryNotFound(_)) => {
            match client.fetch(&location.join(&format!("{stem}.json"))?) {
                Ok(plain) => plain,
                Err(Error::RepositoryNotFound(_)) => {
                    return Err(Error::RepositoryNotFound(location.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Err(e) => return Err(e),
    };

    Ok(serde_json::from_slice(&bytes)?)
}

fn refuse_flags(location: &RepositoryLocation, flags: LoadFlags) -> Result<()> {
    if flags.modifiable {
        return Err(Error::NotModifiableRepository(location.to_string()));
    }
    Ok(())
}

/// Artifact repository served over HTTP
pub struct RemoteArtifactRepository {
    location: RepositoryLocation,
    client: Arc<RepositoryClient>,
    index: RemoteIndex<ArtifactDescriptor>,
}

impl RemoteArtifactRepository {
    pub fn load(location: &RepositoryLocation, client: Arc<RepositoryClient>) -> Result<Self> {
        let index = fetch_index(&client, location, "artifacts")?;
        info!("Loaded {} artifact descriptors from {}", index.entries.len(), location);
        Ok(Self {
            location: location.clone(),
            client,
            index,
        })
    }
}

impl Repository for RemoteArtifactRepository {
    fn location(&self) -> &RepositoryLocation {
        &self.location
    }

    fn name(&self) -> String {
        self.index.name.clone()
    }

    fn is_modifiable(&self) -> bool {
        false
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.index.properties.clone()
    }

    fn set_property(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }
}

impl ArtifactRepository for RemoteArtifactRepository {
    fn contains(&self, key: &ArtifactKey) -> bool {
        self.index.entries.iter().any(|d| d.key == *key)
    }

    fn keys(&self) -> Vec<ArtifactKey> {
        let keys: BTreeSet<_> = self.index.entries.iter().map(|d| d.key.clone()).collect();
        keys.into_iter().collect()
    }

    fn descriptors(&self, key: &ArtifactKey) -> Vec<ArtifactDescriptor> {
        self.index
            .entries
            .iter()
            .filter(|d| d.key == *key)
            .cloned()
            .collect()
    }

    fn read(&self, descriptor: &ArtifactDescriptor) -> Result<Vec<u8>> {
        if !self.index.entries.iter().any(|d| d.same_variant(descriptor)) {
            return Err(Error::ArtifactNotFound(descriptor.to_string()));
        }
        let url = self.location.join(&descriptor.relative_path()?)?;
        self.client.fetch(&url)
    }

    fn write(&self, _descriptor: &ArtifactDescriptor, _content: &[u8]) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }

    fn remove_all(&self) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }
}

/// Metadata repository served over HTTP
pub struct RemoteMetadataRepository {
    location: RepositoryLocation,
    index: RemoteIndex<InstallableUnit>,
}

impl RemoteMetadataRepository {
    pub fn load(location: &RepositoryLocation, client: &RepositoryClient) -> Result<Self> {
        let index = fetch_index(client, location, "content")?;
        info!("Loaded {} units from {}", index.entries.len(), location);
        Ok(Self {
            location: location.clone(),
            index,
        })
    }
}

impl Repository for RemoteMetadataRepository {
    fn location(&self) -> &RepositoryLocation {
        &self.location
    }

    fn name(&self) -> String {
        self.index.name.clone()
    }

    fn is_modifiable(&self) -> bool {
        false
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.index.properties.clone()
    }

    fn set_property(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }
}

impl MetadataRepository for RemoteMetadataRepository {
    fn units(&self) -> Vec<InstallableUnit> {
        self.index.entries.clone()
    }

    fn contains_unit(&self, unit: &InstallableUnit) -> bool {
        self.index.entries.contains(unit)
    }

    fn add_units(&self, _units: &[InstallableUnit]) -> Result<usize> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }

    fn remove_all(&self) -> Result<()> {
        Err(Error::NotModifiableRepository(self.location.to_string()))
    }
}

/// Factory for [`RemoteArtifactRepository`] on `http:`/`https:` locations
pub struct RemoteArtifactRepositoryFactory {
    client: Arc<RepositoryClient>,
}

impl RemoteArtifactRepositoryFactory {
    pub fn new(client: Arc<RepositoryClient>) -> Self {
        Self { client }
    }
}

impl RepositoryFactory<dyn ArtifactRepository> for RemoteArtifactRepositoryFactory {
    fn supports(&self, location: &RepositoryLocation) -> bool {
        location.is_remote()
    }

    fn load(
        &self,
        location: &RepositoryLocation,
        flags: LoadFlags,
    ) -> Result<Arc<dyn ArtifactRepository>> {
        refuse_flags(location, flags)?;
        Ok(Arc::new(RemoteArtifactRepository::load(location, Arc::clone(&self.client))?))
    }

    fn create(
        &self,
        location: &RepositoryLocation,
        _name: &str,
        _kind: RepositoryKind,
        _properties: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn ArtifactRepository>> {
        Err(Error::NotModifiableRepository(location.to_string()))
    }
}

/// Factory for [`RemoteMetadataRepository`] on `http:`/`https:` locations
pub struct RemoteMetadataRepositoryFactory {
    client: Arc<RepositoryClient>,
}

impl RemoteMetadataRepositoryFactory {
    pub fn new(client: Arc<RepositoryClient>) -> Self {
        Self { client }
    }
}

impl RepositoryFactory<dyn MetadataRepository> for RemoteMetadataRepositoryFactory {
    fn supports(&self, location: &RepositoryLocation) -> bool {
        location.is_remote()
    }

    fn load(
        &self,
        location: &RepositoryLocation,
        flags: LoadFlags,
    ) -> Result<Arc<dyn MetadataRepository>> {
        refuse_flags(location, flags)?;
        Ok(Arc::new(RemoteMetadataRepository::load(location, &self.client)?))
    }

    fn create(
        &self,
        location: &RepositoryLocation,
        _name: &str,
        _kind: RepositoryKind,
        _properties: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn MetadataRepository>> {
        Err(Error::NotModifiableRepository(location.to_string()))
    }
}
