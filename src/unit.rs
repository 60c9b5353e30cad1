// src/unit.rs

//! Installable units and artifact keys
//!
//! An installable unit (IU) is a named, versioned piece of software resolved from a
//! target definition. It references zero or more binary payloads by [`ArtifactKey`].
//! Both types are produced by the target resolver and treated as immutable here.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Classifier for OSGi bundles (plugins)
pub const CLASSIFIER_BUNDLE: &str = "osgi.bundle";

/// Classifier for Eclipse features
pub const CLASSIFIER_FEATURE: &str = "org.eclipse.update.feature";

/// Classifier for native binaries (launchers, executables)
pub const CLASSIFIER_BINARY: &str = "binary";

/// Address of one binary payload inside an artifact repository
///
/// Keys read from indexes, unit files or their text form are validated, since their
/// parts end up in file names. Keys built in code are checked with
/// [`validate`](Self::validate) before anything touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawArtifactKey")]
pub struct ArtifactKey {
    pub classifier: String,
    pub id: String,
    pub version: String,
}

#[derive(Deserialize)]
struct RawArtifactKey {
    classifier: String,
    id: String,
    version: String,
}

impl TryFrom<RawArtifactKey> for ArtifactKey {
    type Error = Error;

    fn try_from(raw: RawArtifactKey) -> Result<Self> {
        let key = Self::new(raw.classifier, raw.id, raw.version);
        key.validate()?;
        Ok(key)
    }
}

impl ArtifactKey {
    pub fn new(
        classifier: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            classifier: classifier.into(),
            id: id.into(),
            version: version.into(),
        }
    }

    /// Shorthand for an OSGi bundle key
    pub fn bundle(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(CLASSIFIER_BUNDLE, id, version)
    }

    /// Shorthand for a feature key
    pub fn feature(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(CLASSIFIER_FEATURE, id, version)
    }

    /// Check that every part is usable as a single file name component
    pub fn validate(&self) -> Result<()> {
        for (part, value) in [
            ("classifier", &self.classifier),
            ("id", &self.id),
            ("version", &self.version),
        ] {
            let reason = if value.is_empty() {
                "empty"
            } else if value.contains(['/', '\\', '\0']) {
                "contains a path separator"
            } else if value.contains("..") {
                "contains '..'"
            } else {
                continue;
            };
            return Err(Error::InvalidArtifactKey {
                key: self.to_string(),
                reason: format!("{part} {reason}"),
            });
        }
        Ok(())
    }

    /// File stem used when the payload is laid out on disk (`<id>_<version>`)
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.id, self.version)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.classifier, self.id, self.version)
    }
}

impl FromStr for ArtifactKey {
    type Err = Error;

    /// Parse the external form `classifier,id,version`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [classifier, id, version] => {
                let key = Self::new(*classifier, *id, *version);
                key.validate()?;
                Ok(key)
            }
            _ => Err(Error::Parse(format!(
                "Invalid artifact key '{s}': expected 'classifier,id,version'"
            ))),
        }
    }
}

/// A unit of installable software
///
/// Identity is the `(id, version)` pair: two units with the same identity are the
/// same unit even if their artifact lists or properties differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallableUnit {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub artifacts: Vec<ArtifactKey>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl InstallableUnit {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            artifacts: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style helper to attach an artifact reference
    pub fn with_artifact(mut self, key: ArtifactKey) -> Self {
        self.artifacts.push(key);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn identity(&self) -> (&str, &str) {
        (&self.id, &self.version)
    }
}

impl PartialEq for InstallableUnit {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for InstallableUnit {}

impl Hash for InstallableUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for InstallableUnit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InstallableUnit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for InstallableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// Union of the artifact keys referenced by `units`
pub fn collect_artifact_keys<'a>(
    units: impl IntoIterator<Item = &'a InstallableUnit>,
) -> BTreeSet<ArtifactKey> {
    units
        .into_iter()
        .flat_map(|unit| unit.artifacts.iter().cloned())
        .collect()
}
