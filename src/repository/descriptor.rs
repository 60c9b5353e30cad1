// src/repository/descriptor.rs

//! Artifact descriptors
//!
//! A descriptor is what an artifact repository knows about one stored payload: the key
//! it answers to, which variant it is (canonical or packed), and its size and digest.

use crate::error::{Error, Result};
use crate::unit::{ArtifactKey, CLASSIFIER_BUNDLE, CLASSIFIER_FEATURE};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Format marker of pack200-compressed payload variants
pub const FORMAT_PACKED: &str = "packed";

/// SHA-256 of `content` as lowercase hex
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Metadata of one stored artifact payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub key: ArtifactKey,
    /// `None` for the canonical payload, e.g. `Some("packed")` for variants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl ArtifactDescriptor {
    pub fn new(key: ArtifactKey) -> Self {
        Self {
            key,
            format: None,
            size: None,
            sha256: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn packed(key: ArtifactKey) -> Self {
        Self {
            format: Some(FORMAT_PACKED.to_string()),
            ..Self::new(key)
        }
    }

    /// Descriptor for `content`, with size and digest filled in
    pub fn for_content(key: ArtifactKey, content: &[u8]) -> Self {
        Self::new(key).with_digest_of(content)
    }

    /// Replace size and digest with those of `content`
    pub fn with_digest_of(mut self, content: &[u8]) -> Self {
        self.size = Some(content.len() as u64);
        self.sha256 = Some(sha256_hex(content));
        self
    }

    pub fn is_packed(&self) -> bool {
        self.format.as_deref() == Some(FORMAT_PACKED)
    }

    /// Same payload variant (key and format), ignoring digests
    pub fn same_variant(&self, other: &ArtifactDescriptor) -> bool {
        self.key == other.key && self.format == other.format
    }

    /// Check `content` against the recorded size and digest, where present
    pub fn verify(&self, content: &[u8]) -> Result<()> {
        if let Some(size) = self.size
            && size != content.len() as u64
        {
            return Err(Error::ChecksumMismatch {
                artifact: self.to_string(),
                expected: format!("{size} bytes"),
                actual: format!("{} bytes", content.len()),
            });
        }

        if let Some(expected) = &self.sha256 {
            let actual = sha256_hex(content);
            if !expected.eq_ignore_ascii_case(&actual) {
                return Err(Error::ChecksumMismatch {
                    artifact: self.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(())
    }

    /// Repository-relative path of the payload, `/`-separated
    ///
    /// Bundles go to `plugins/`, features to `features/`, anything else to `binary/`.
    /// Fails for keys whose parts would escape that folder.
    pub fn relative_path(&self) -> Result<String> {
        self.key.validate()?;
        let (dir, ext) = match self.key.classifier.as_str() {
            CLASSIFIER_BUNDLE => ("plugins", ".jar"),
            CLASSIFIER_FEATURE => ("features", ".jar"),
            _ => ("binary", ""),
        };
        let suffix = if self.is_packed() { ".pack.gz" } else { "" };
        Ok(format!("{dir}/{}{ext}{suffix}", self.key.file_stem()))
    }
}

impl fmt::Display for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.format {
            Some(format) => write!(f, "{} ({format})", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}
