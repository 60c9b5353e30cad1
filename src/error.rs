// src/error.rs

//! Error types for tpexport
//!
//! Fatal conditions of a mirror run are surfaced as [`Error`] values. Per-artifact
//! copy failures are not errors: they are recorded in the returned
//! [`Status`](crate::status::Status) tree instead.

use std::fmt;
use thiserror::Error;

/// Which half of a repository pair an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositorySide {
    /// Binary payload repository
    Artifact,
    /// Installable unit metadata repository
    Metadata,
}

impl fmt::Display for RepositorySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositorySide::Artifact => write!(f, "artifact"),
            RepositorySide::Metadata => write!(f, "metadata"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// No provisioning agent could be obtained
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Invalid destination repository folder: '{0}'")]
    InvalidDestination(String),

    #[error("Error loading/initializing {side} repository in '{location}': {source}")]
    DestinationInit {
        side: RepositorySide,
        location: String,
        #[source]
        source: Box<Error>,
    },

    /// A destination repository refused writes after load/create
    #[error("Destination repository is not modifiable: {0}")]
    NotModifiable(String),

    /// Cooperative cancellation was observed between steps
    #[error("Operation interrupted")]
    Interrupted,

    #[error("No repository found at {0}")]
    RepositoryNotFound(String),

    #[error("Repository already exists at {0}")]
    AlreadyExists(String),

    #[error("No repository factory handles location {0}")]
    UnsupportedLocation(String),

    /// A write was attempted on a read-only repository
    #[error("Repository at {0} is read-only")]
    NotModifiableRepository(String),

    /// An artifact key part cannot be used as a file name
    #[error("Invalid artifact key {key}: {reason}")]
    InvalidArtifactKey { key: String, reason: String },

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Checksum mismatch for {artifact}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for cooperative cancellation ("stopped, not broken")
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }

    /// True for caller or environment misconfiguration that retrying won't fix
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidDestination(_) | Error::NotModifiable(_) | Error::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
