// src/lib.rs

//! Target platform export
//!
//! Builds p2 repositories from resolved Eclipse target platforms: the artifacts
//! referenced by a set of installable units are mirrored from their source
//! repositories into a destination repository pair, and the units are merged into
//! the destination's metadata.
//!
//! # Architecture
//!
//! - Registries: repositories are loaded through per-kind managers that cache by location
//! - Transient registrations: a run unregisters every repository it touched on exit
//! - Status trees: per-artifact failures are data, fatal conditions are errors
//! - Cooperative cancellation: checked before each artifact and between phases

pub mod agent;
pub mod config;
mod error;
pub mod export;
pub mod lock;
pub mod mirror;
pub mod progress;
pub mod repository;
pub mod status;
pub mod unit;

pub use agent::{Agent, AgentProvider, DefaultAgentProvider, ProvisioningContext};
pub use config::{BatchConfig, MirrorOptions, PlatformConfig};
pub use error::{Error, RepositorySide, Result};
pub use export::{
    ConfigurationExporter, DirectoryExporter, ExportBatch, ExportOutcome, ResolvedTarget,
    ResolvedTargetFile, TargetResolver,
};
pub use mirror::{ArtifactMirror, MirrorOperation, MirrorPhase, MirrorRequest};
pub use progress::{CancellationToken, CliProgress, LogProgress, ProgressTracker, SilentProgress};
pub use repository::{
    ArtifactDescriptor, ArtifactRepository, MetadataRepository, Repository, RepositoryLocation,
};
pub use status::{MultiStatus, Severity, Status};
pub use unit::{ArtifactKey, InstallableUnit};
