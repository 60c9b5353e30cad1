// src/repository/mod.rs

//! Artifact and metadata repositories
//!
//! This module provides:
//! - The [`ArtifactRepository`] and [`MetadataRepository`] abstractions
//! - Registry-style managers that cache loaded repositories by location
//! - A simple on-disk repository format (JSON index, optionally zstd-compressed)
//! - Read-only HTTP repositories
//! - Composite in-memory views over several source repositories
//! - Transient registration tracking so a run leaves the registries as it found them

mod client;
mod composite;
mod descriptor;
mod location;
mod manager;
mod registration;
mod remote;
mod simple;

pub use client::RepositoryClient;
pub use composite::{CompositeArtifactView, CompositeMetadataView, SourceView};
pub use descriptor::{ArtifactDescriptor, FORMAT_PACKED, sha256_hex};
pub use location::RepositoryLocation;
pub use manager::{
    ArtifactRepositoryManager, MetadataRepositoryManager, RepositoryFactory, RepositoryManager,
};
pub use registration::{CleanupGuard, RegistrationTracker};
pub use remote::{
    RemoteArtifactRepository, RemoteArtifactRepositoryFactory, RemoteMetadataRepository,
    RemoteMetadataRepositoryFactory,
};
pub(crate) use simple::write_file;
pub use simple::{
    SimpleArtifactRepository, SimpleArtifactRepositoryFactory, SimpleMetadataRepository,
    SimpleMetadataRepositoryFactory,
};

use crate::error::Result;
use crate::unit::{ArtifactKey, InstallableUnit};
use std::collections::BTreeMap;
use std::fmt;

/// Repository property: indexes are stored compressed
pub const PROP_COMPRESSED: &str = "p2.compressed";

/// Repository property: indexes are replaced atomically on save
pub const PROP_ATOMIC: &str = "p2.atomic";

/// Repository property: creation time in milliseconds since the epoch
pub const PROP_TIMESTAMP: &str = "p2.timestamp";

/// Storage layout of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepositoryKind {
    /// Flat index file plus payload folders
    #[default]
    Simple,
}

impl RepositoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryKind::Simple => "simple",
        }
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags for loading a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadFlags {
    /// The caller intends to write; loaders may refuse read-only backends early
    pub modifiable: bool,
}

impl LoadFlags {
    pub const NONE: LoadFlags = LoadFlags { modifiable: false };
    pub const MODIFIABLE: LoadFlags = LoadFlags { modifiable: true };
}

/// Behaviour shared by artifact and metadata repositories
pub trait Repository: Send + Sync {
    fn location(&self) -> &RepositoryLocation;

    fn name(&self) -> String;

    /// Whether writes are accepted
    fn is_modifiable(&self) -> bool;

    fn property(&self, key: &str) -> Option<String> {
        self.properties().get(key).cloned()
    }

    fn properties(&self) -> BTreeMap<String, String>;

    /// Set and persist a repository property
    fn set_property(&self, key: &str, value: &str) -> Result<()>;
}

/// Store of binary payloads addressed by [`ArtifactKey`]
pub trait ArtifactRepository: Repository {
    fn contains(&self, key: &ArtifactKey) -> bool;

    /// Every key with at least one stored payload
    fn keys(&self) -> Vec<ArtifactKey>;

    /// Payload variants stored for `key`
    fn descriptors(&self, key: &ArtifactKey) -> Vec<ArtifactDescriptor>;

    /// Raw payload bytes of one variant
    fn read(&self, descriptor: &ArtifactDescriptor) -> Result<Vec<u8>>;

    /// Store a payload, replacing any variant with the same key and format
    fn write(&self, descriptor: &ArtifactDescriptor, content: &[u8]) -> Result<()>;

    /// Empty the repository
    fn remove_all(&self) -> Result<()>;
}

/// Store of installable-unit metadata
pub trait MetadataRepository: Repository {
    fn units(&self) -> Vec<InstallableUnit>;

    fn contains_unit(&self, unit: &InstallableUnit) -> bool;

    /// Add units not yet present by identity; returns how many were new
    fn add_units(&self, units: &[InstallableUnit]) -> Result<usize>;

    /// Empty the repository
    fn remove_all(&self) -> Result<()>;
}
