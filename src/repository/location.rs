// src/repository/location.rs

//! Repository locations
//!
//! Every repository is addressed by an absolute URI. Filesystem paths are accepted
//! wherever a location is expected and are turned into `file:` URIs relative to the
//! current directory, with `.`/`..` resolved and trailing separators removed, so the
//! same folder always maps to the same registry key.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Normalized absolute URI of a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryLocation(Url);

impl RepositoryLocation {
    /// Parse a URI (`file:`, `http:`, `https:`, `memory:`) or a filesystem path
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::Parse("Empty repository location".to_string()));
        }

        if has_scheme(input) {
            let url = Url::parse(input)
                .map_err(|e| Error::Parse(format!("Invalid repository URI '{input}': {e}")))?;
            Self::from_url(url)
        } else {
            Self::from_path(Path::new(input))
        }
    }

    /// Resolve the user-supplied destination folder
    ///
    /// Anything that cannot be turned into a location is reported as
    /// [`Error::InvalidDestination`] carrying the raw input.
    pub fn from_destination(input: &str) -> Result<Self> {
        Self::parse(input).map_err(|_| Error::InvalidDestination(input.to_string()))
    }

    pub fn from_url(url: Url) -> Result<Self> {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|()| Error::Parse(format!("Not a local file URI: {url}")))?;
            return Self::from_path(&path);
        }

        if url.cannot_be_a_base() && url.scheme() != "memory" {
            return Err(Error::Parse(format!("Not a hierarchical URI: {url}")));
        }

        let mut url = url;
        let trimmed = url.path().trim_end_matches('/').to_string();
        if !trimmed.is_empty() {
            url.set_path(&trimmed);
        }
        Ok(Self(url))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let normalized = normalize(&absolute);
        Url::from_file_path(&normalized)
            .map(Self)
            .map_err(|()| Error::Parse(format!("Invalid repository path: {}", path.display())))
    }

    /// In-process location for repositories that exist only in memory
    pub fn memory(name: &str) -> Result<Self> {
        Url::parse(&format!("memory:{name}"))
            .map(Self)
            .map_err(|e| Error::Parse(format!("Invalid memory location '{name}': {e}")))
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_local(&self) -> bool {
        self.0.scheme() == "file"
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.0.scheme(), "http" | "https")
    }

    /// Filesystem path for `file:` locations
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.is_local() {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }

    /// URL of a `/`-separated path below this location
    pub fn join(&self, relative: &str) -> Result<Url> {
        let base = self.0.as_str().trim_end_matches('/');
        let joined = format!("{base}/{}", relative.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| Error::Parse(format!("Invalid URL '{joined}': {e}")))
    }
}

/// Scheme prefix check that leaves Windows drive letters (`C:\`) to the path branch
fn has_scheme(input: &str) -> bool {
    input.contains("://") || input.starts_with("file:") || input.starts_with("memory:")
}

/// Lexically resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl fmt::Display for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RepositoryLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepositoryLocation {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RepositoryLocation> for String {
    fn from(location: RepositoryLocation) -> Self {
        location.0.into()
    }
}
