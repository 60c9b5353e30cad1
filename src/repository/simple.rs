// src/repository/simple.rs

//! Simple on-disk repositories
//!
//! A simple repository is a folder with a JSON index and, for artifacts, one payload
//! file per stored variant:
//!
//! ```text
//! <root>/
//!   artifacts.json[.zst]      artifact index
//!   content.json[.zst]        metadata index
//!   plugins/<id>_<version>.jar
//!   features/<id>_<version>.jar
//!   binary/<id>_<version>
//! ```
//!
//! The index is zstd-compressed when the repository's `p2.compressed` property is
//! `"true"`; switching the property rewrites the index in the other form. Index and
//! payload writes go to a temporary file first and are renamed into place. A payload
//! is always on disk before the index entry that refers to it.

use super::{
    ArtifactDescriptor, ArtifactRepository, LoadFlags, MetadataRepository, PROP_ATOMIC,
    PROP_COMPRESSED, PROP_TIMESTAMP, Repository, RepositoryFactory, RepositoryKind,
    RepositoryLocation,
};
use crate::error::{Error, Result};
use crate::unit::{ArtifactKey, InstallableUnit};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const ARTIFACT_INDEX: &str = "artifacts";
const METADATA_INDEX: &str = "content";
const INDEX_VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Serialize, Deserialize)]
struct Index<T> {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    version: u32,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default = "Vec::new")]
    entries: Vec<T>,
}

/// Write `content` to `path`, through a sibling temp file when `atomic`
pub(crate) fn write_file(path: &Path, content: &[u8], atomic: bool) -> Result<()> {
    if !atomic {
        fs::write(path, content)?;
        return Ok(());
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// The index file of one repository plus its in-memory copy
struct IndexFile<T> {
    location: RepositoryLocation,
    root: PathBuf,
    stem: &'static str,
    index: Mutex<Index<T>>,
}

impl<T: Serialize + DeserializeOwned> IndexFile<T> {
    fn root_of(location: &RepositoryLocation) -> Result<PathBuf> {
        location
            .to_file_path()
            .ok_or_else(|| Error::UnsupportedLocation(location.to_string()))
    }

    fn plain_path(root: &Path, stem: &str) -> PathBuf {
        root.join(format!("{stem}.json"))
    }

    fn compressed_path(root: &Path, stem: &str) -> PathBuf {
        root.join(format!("{stem}.json.zst"))
    }

    fn exists(root: &Path, stem: &str) -> bool {
        Self::compressed_path(root, stem).is_file() || Self::plain_path(root, stem).is_file()
    }

    fn open(location: &RepositoryLocation, stem: &'static str) -> Result<Self> {
        let root = Self::root_of(location)?;

        let compressed = Self::compressed_path(&root, stem);
        let plain = Self::plain_path(&root, stem);
        let bytes = if compressed.is_file() {
            zstd::decode_all(fs::read(&compressed)?.as_slice())?
        } else if plain.is_file() {
            fs::read(&plain)?
        } else {
            return Err(Error::RepositoryNotFound(location.to_string()));
        };

        let index: Index<T> = serde_json::from_slice(&bytes)?;
        Ok(Self {
            location: location.clone(),
            root,
            stem,
            index: Mutex::new(index),
        })
    }

    fn create(
        location: &RepositoryLocation,
        stem: &'static str,
        name: &str,
        kind: RepositoryKind,
        properties: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let root = Self::root_of(location)?;
        if Self::exists(&root, stem) {
            return Err(Error::AlreadyExists(location.to_string()));
        }
        fs::create_dir_all(&root)?;

        let mut properties = properties.clone();
        properties.insert(
            PROP_TIMESTAMP.to_string(),
            chrono::Utc::now().timestamp_millis().to_string(),
        );

        let file = Self {
            location: location.clone(),
            root,
            stem,
            index: Mutex::new(Index {
                name: name.to_string(),
                kind: kind.as_str().to_string(),
                version: INDEX_VERSION,
                properties,
                entries: Vec::new(),
            }),
        };
        file.save(&file.index.lock())?;
        Ok(file)
    }

    fn save(&self, index: &Index<T>) -> Result<()> {
        let compressed = index.properties.get(PROP_COMPRESSED).map(String::as_str) == Some("true");
        let atomic = index.properties.get(PROP_ATOMIC).map(String::as_str) != Some("false");

        let json = serde_json::to_vec_pretty(index)?;
        let (target, stale, bytes) = if compressed {
            (
                Self::compressed_path(&self.root, self.stem),
                Self::plain_path(&self.root, self.stem),
                zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?,
            )
        } else {
            (
                Self::plain_path(&self.root, self.stem),
                Self::compressed_path(&self.root, self.stem),
                json,
            )
        };

        write_file(&target, &bytes, atomic)?;
        remove_if_present(&stale)?;
        debug!("Saved {} ({} entries)", target.display(), index.entries.len());
        Ok(())
    }

    fn is_modifiable(&self) -> bool {
        fs::metadata(&self.root)
            .map(|meta| meta.is_dir() && !meta.permissions().readonly())
            .unwrap_or(false)
    }

    fn check_modifiable(&self) -> Result<()> {
        if self.is_modifiable() {
            Ok(())
        } else {
            Err(Error::NotModifiableRepository(self.location.to_string()))
        }
    }

    fn name(&self) -> String {
        self.index.lock().name.clone()
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.index.lock().properties.clone()
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.check_modifiable()?;
        let mut index = self.index.lock();
        if index.properties.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        index.properties.insert(key.to_string(), value.to_string());
        self.save(&index)
    }
}

/// Artifact repository stored in a local folder
pub struct SimpleArtifactRepository {
    file: IndexFile<ArtifactDescriptor>,
}

impl SimpleArtifactRepository {
    pub fn open(location: &RepositoryLocation) -> Result<Self> {
        Ok(Self {
            file: IndexFile::open(location, ARTIFACT_INDEX)?,
        })
    }

    pub fn create(
        location: &RepositoryLocation,
        name: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<Self> {
        Ok(Self {
            file: IndexFile::create(location, ARTIFACT_INDEX, name, RepositoryKind::Simple, properties)?,
        })
    }

    /// Folder holding the index and payloads
    pub fn root(&self) -> &Path {
        &self.file.root
    }

    fn payload_path(&self, descriptor: &ArtifactDescriptor) -> Result<PathBuf> {
        Ok(self.file.root.join(descriptor.relative_path()?))
    }
}

impl Repository for SimpleArtifactRepository {
    fn location(&self) -> &RepositoryLocation {
        &self.file.location
    }

    fn name(&self) -> String {
        self.file.name()
    }

    fn is_modifiable(&self) -> bool {
        self.file.is_modifiable()
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.file.properties()
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.file.set_property(key, value)
    }
}

impl ArtifactRepository for SimpleArtifactRepository {
    fn contains(&self, key: &ArtifactKey) -> bool {
        self.file.index.lock().entries.iter().any(|d| d.key == *key)
    }

    fn keys(&self) -> Vec<ArtifactKey> {
        let index = self.file.index.lock();
        let keys: BTreeSet<_> = index.entries.iter().map(|d| d.key.clone()).collect();
        keys.into_iter().collect()
    }

    fn descriptors(&self, key: &ArtifactKey) -> Vec<ArtifactDescriptor> {
        self.file
            .index
            .lock()
            .entries
            .iter()
            .filter(|d| d.key == *key)
            .cloned()
            .collect()
    }

    fn read(&self, descriptor: &ArtifactDescriptor) -> Result<Vec<u8>> {
        let stored = self
            .file
            .index
            .lock()
            .entries
            .iter()
            .find(|d| d.same_variant(descriptor))
            .cloned()
            .ok_or_else(|| Error::ArtifactNotFound(descriptor.to_string()))?;

        Ok(fs::read(self.payload_path(&stored)?)?)
    }

    fn write(&self, descriptor: &ArtifactDescriptor, content: &[u8]) -> Result<()> {
        let path = self.payload_path(descriptor)?;
        self.file.check_modifiable()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_file(&path, content, true)?;

        let stored = descriptor.clone().with_digest_of(content);
        let mut index = self.file.index.lock();
        index.entries.retain(|d| !d.same_variant(&stored));
        index.entries.push(stored);
        index
            .entries
            .sort_by(|a, b| (&a.key, &a.format).cmp(&(&b.key, &b.format)));
        self.file.save(&index)
    }

    fn remove_all(&self) -> Result<()> {
        self.file.check_modifiable()?;

        let mut index = self.file.index.lock();
        for descriptor in &index.entries {
            let removed = self
                .payload_path(descriptor)
                .and_then(|path| remove_if_present(&path));
            if let Err(e) = removed {
                warn!("Failed to remove payload of {}: {}", descriptor, e);
            }
        }
        index.entries.clear();
        self.file.save(&index)
    }
}

/// Metadata repository stored in a local folder
pub struct SimpleMetadataRepository {
    file: IndexFile<InstallableUnit>,
}

impl SimpleMetadataRepository {
    pub fn open(location: &RepositoryLocation) -> Result<Self> {
        Ok(Self {
            file: IndexFile::open(location, METADATA_INDEX)?,
        })
    }

    pub fn create(
        location: &RepositoryLocation,
        name: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<Self> {
        Ok(Self {
            file: IndexFile::create(location, METADATA_INDEX, name, RepositoryKind::Simple, properties)?,
        })
    }
}

impl Repository for SimpleMetadataRepository {
    fn location(&self) -> &RepositoryLocation {
        &self.file.location
    }

    fn name(&self) -> String {
        self.file.name()
    }

    fn is_modifiable(&self) -> bool {
        self.file.is_modifiable()
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.file.properties()
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.file.set_property(key, value)
    }
}

impl MetadataRepository for SimpleMetadataRepository {
    fn units(&self) -> Vec<InstallableUnit> {
        self.file.index.lock().entries.clone()
    }

    fn contains_unit(&self, unit: &InstallableUnit) -> bool {
        self.file.index.lock().entries.contains(unit)
    }

    fn add_units(&self, units: &[InstallableUnit]) -> Result<usize> {
        self.file.check_modifiable()?;

        let mut index = self.file.index.lock();
        let mut added = 0;
        for unit in units {
            if !index.entries.contains(unit) {
                index.entries.push(unit.clone());
                added += 1;
            }
        }

        if added > 0 {
            index.entries.sort();
            self.file.save(&index)?;
        }
        Ok(added)
    }

    fn remove_all(&self) -> Result<()> {
        self.file.check_modifiable()?;

        let mut index = self.file.index.lock();
        index.entries.clear();
        self.file.save(&index)
    }
}

/// Factory for [`SimpleArtifactRepository`] on `file:` locations
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleArtifactRepositoryFactory;

impl RepositoryFactory<dyn ArtifactRepository> for SimpleArtifactRepositoryFactory {
    fn supports(&self, location: &RepositoryLocation) -> bool {
        location.is_local()
    }

    fn load(
        &self,
        location: &RepositoryLocation,
        _flags: LoadFlags,
    ) -> Result<Arc<dyn ArtifactRepository>> {
        Ok(Arc::new(SimpleArtifactRepository::open(location)?))
    }

    fn create(
        &self,
        location: &RepositoryLocation,
        name: &str,
        _kind: RepositoryKind,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn ArtifactRepository>> {
        Ok(Arc::new(SimpleArtifactRepository::create(location, name, properties)?))
    }
}

/// Factory for [`SimpleMetadataRepository`] on `file:` locations
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleMetadataRepositoryFactory;

impl RepositoryFactory<dyn MetadataRepository> for SimpleMetadataRepositoryFactory {
    fn supports(&self, location: &RepositoryLocation) -> bool {
        location.is_local()
    }

    fn load(
        &self,
        location: &RepositoryLocation,
        _flags: LoadFlags,
    ) -> Result<Arc<dyn MetadataRepository>> {
        Ok(Arc::new(SimpleMetadataRepository::open(location)?))
    }

    fn create(
        &self,
        location: &RepositoryLocation,
        name: &str,
        _kind: RepositoryKind,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn MetadataRepository>> {
        Ok(Arc::new(SimpleMetadataRepository::create(location, name, properties)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn location(temp: &TempDir) -> RepositoryLocation {
        RepositoryLocation::from_path(temp.path()).unwrap()
    }

    #[test]
    fn test_create_and_reopen_artifacts() {
        let temp = TempDir::new().unwrap();
        let loc = location(&temp);
        let key = ArtifactKey::bundle("org.a", "1.0");

        let repo = SimpleArtifactRepository::create(&loc, "Target", &BTreeMap::new()).unwrap();
        assert!(repo.is_modifiable());
        assert!(repo.property(PROP_TIMESTAMP).is_some());
        repo.write(&ArtifactDescriptor::new(key.clone()), b"jar-bytes").unwrap();
        assert!(temp.path().join("plugins/org.a_1.0.jar").is_file());

        let reopened = SimpleArtifactRepository::open(&loc).unwrap();
        assert_eq!(reopened.name(), "Target");
        assert_eq!(reopened.keys(), vec![key.clone()]);

        let descriptor = &reopened.descriptors(&key)[0];
        assert_eq!(descriptor.size, Some(9));
        assert_eq!(reopened.read(descriptor).unwrap(), b"jar-bytes");
    }

    #[test]
    fn test_create_twice_fails() {
        let temp = TempDir::new().unwrap();
        let loc = location(&temp);

        SimpleMetadataRepository::create(&loc, "Target", &BTreeMap::new()).unwrap();
        let err = SimpleMetadataRepository::create(&loc, "Target", &BTreeMap::new()).err().unwrap();
        assert!(matches!(err, Error::AlreadyExists(_)));

        // The artifact side of the same folder is independent
        assert!(SimpleArtifactRepository::create(&loc, "Target", &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = SimpleArtifactRepository::open(&location(&temp)).err().unwrap();
        assert!(matches!(err, Error::RepositoryNotFound(_)));
    }

    #[test]
    fn test_compressed_property_switches_index_form() {
        let temp = TempDir::new().unwrap();
        let loc = location(&temp);

        let repo = SimpleMetadataRepository::create(&loc, "Target", &BTreeMap::new()).unwrap();
        assert!(temp.path().join("content.json").is_file());

        repo.set_property(PROP_COMPRESSED, "true").unwrap();
        assert!(temp.path().join("content.json.zst").is_file());
        assert!(!temp.path().join("content.json").exists());

        repo.add_units(&[InstallableUnit::new("x", "1.0")]).unwrap();
        let reopened = SimpleMetadataRepository::open(&loc).unwrap();
        assert_eq!(reopened.units().len(), 1);
        assert_eq!(reopened.property(PROP_COMPRESSED).as_deref(), Some("true"));
    }

    #[test]
    fn test_add_units_skips_known_identities() {
        let temp = TempDir::new().unwrap();
        let repo = SimpleMetadataRepository::create(&location(&temp), "T", &BTreeMap::new()).unwrap();

        let units = vec![InstallableUnit::new("x", "1.0"), InstallableUnit::new("y", "2.0")];
        assert_eq!(repo.add_units(&units).unwrap(), 2);
        assert_eq!(repo.add_units(&units).unwrap(), 0);
        assert_eq!(repo.units().len(), 2);
        assert!(repo.contains_unit(&InstallableUnit::new("y", "2.0")));
    }

    #[test]
    fn test_write_replaces_same_variant() {
        let temp = TempDir::new().unwrap();
        let repo = SimpleArtifactRepository::create(&location(&temp), "T", &BTreeMap::new()).unwrap();
        let key = ArtifactKey::feature("org.f", "1.0");

        repo.write(&ArtifactDescriptor::new(key.clone()), b"first").unwrap();
        repo.write(&ArtifactDescriptor::new(key.clone()), b"second").unwrap();
        repo.write(&ArtifactDescriptor::packed(key.clone()), b"packed").unwrap();

        let descriptors = repo.descriptors(&key);
        assert_eq!(descriptors.len(), 2);
        let canonical = descriptors.iter().find(|d| !d.is_packed()).unwrap();
        assert_eq!(repo.read(canonical).unwrap(), b"second");
    }

    #[test]
    fn test_remove_all_clears_payloads() {
        let temp = TempDir::new().unwrap();
        let repo = SimpleArtifactRepository::create(&location(&temp), "T", &BTreeMap::new()).unwrap();
        let key = ArtifactKey::bundle("org.a", "1.0");
        repo.write(&ArtifactDescriptor::new(key.clone()), b"x").unwrap();

        repo.remove_all().unwrap();
        assert!(!repo.contains(&key));
        assert!(!temp.path().join("plugins/org.a_1.0.jar").exists());
    }

    #[test]
    fn test_non_atomic_index_writes() {
        let temp = TempDir::new().unwrap();
        let mut properties = BTreeMap::new();
        properties.insert(PROP_ATOMIC.to_string(), "false".to_string());
        let repo = SimpleMetadataRepository::create(&location(&temp), "T", &properties).unwrap();

        repo.add_units(&[InstallableUnit::new("x", "1.0")]).unwrap();
        assert!(temp.path().join("content.json").is_file());
        assert!(!temp.path().join("content.json.tmp").exists());
    }

    #[test]
    fn test_write_rejects_key_escaping_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("x/y/out");
        let loc = RepositoryLocation::from_path(&root).unwrap();
        let repo = SimpleArtifactRepository::create(&loc, "T", &BTreeMap::new()).unwrap();
        let key = ArtifactKey::bundle("../../../escaped", "1");

        let err = repo.write(&ArtifactDescriptor::new(key.clone()), b"x").unwrap_err();
        assert!(matches!(err, Error::InvalidArtifactKey { .. }));
        assert!(!repo.contains(&key));
        assert!(!temp.path().join("x/escaped_1.jar").exists());
        assert!(!temp.path().join("escaped_1.jar").exists());
    }
}
