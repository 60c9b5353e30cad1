// src/config.rs

//! Configuration types
//!
//! - [`MirrorOptions`]: how the destination repository pair is opened and filled
//! - [`PlatformConfig`]: one OS/windowing-system/architecture row
//! - [`BatchConfig`]: a whole export batch (targets × configurations → destination)
//!
//! All three are plain serde types so they can live in TOML files.

use crate::error::{Error, Result};
use crate::repository::RepositoryLocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Options for a mirror run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorOptions {
    /// Name given to destination repositories when they are created
    pub repository_name: String,
    /// Store repository indexes compressed
    pub compressed: bool,
    /// Write repository indexes atomically (temp file + rename)
    pub atomic: bool,
    /// Keep what an existing destination already contains
    pub append: bool,
    /// Re-read every copied artifact from the destination and compare it to the source
    pub validate: bool,
    /// Also transfer packed variants of artifacts
    pub include_packed: bool,
    /// Report informational per-artifact entries in the status tree
    pub verbose: bool,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            repository_name: "Target".to_string(),
            compressed: true,
            atomic: true,
            append: true,
            validate: false,
            include_packed: false,
            verbose: true,
        }
    }
}

impl MirrorOptions {
    /// Load options from a TOML file; missing keys take their defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("Invalid options file {}: {e}", path.display())))
    }
}

/// Target platform configuration: operating system, windowing system, architecture
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformConfig {
    pub os: String,
    pub ws: String,
    pub arch: String,
}

impl PlatformConfig {
    pub fn new(os: impl Into<String>, ws: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            ws: ws.into(),
            arch: arch.into(),
        }
    }

    /// Configuration of the platform this process runs on
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "linux" => "linux",
            "windows" => "win32",
            "macos" => "macosx",
            other => other,
        };
        let ws = match os {
            "win32" => "win32",
            "macosx" => "cocoa",
            _ => "gtk",
        };
        Self::new(os, ws, std::env::consts::ARCH)
    }

    /// Check that no field is blank
    pub fn validate(&self) -> Result<()> {
        if self.arch.trim().is_empty() {
            return Err(Error::Config("Fill missing 'arch' configuration".to_string()));
        }
        if self.os.trim().is_empty() {
            return Err(Error::Config("Fill missing 'OS' configuration".to_string()));
        }
        if self.ws.trim().is_empty() {
            return Err(Error::Config("Fill missing 'WS' configuration".to_string()));
        }
        Ok(())
    }

    /// Directory-safe form (`os.ws.arch`)
    pub fn dir_name(&self) -> String {
        format!("{}.{}.{}", self.os, self.ws, self.arch)
    }
}

impl fmt::Display for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.os, self.ws, self.arch)
    }
}

impl FromStr for PlatformConfig {
    type Err = Error;

    /// Parse `os/ws/arch`; blank fields are accepted here and rejected by `validate`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [os, ws, arch] => Ok(Self::new(os.trim(), ws.trim(), arch.trim())),
            _ => Err(Error::Parse(format!(
                "Invalid configuration '{s}': expected 'os/ws/arch'"
            ))),
        }
    }
}

impl TryFrom<String> for PlatformConfig {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PlatformConfig> for String {
    fn from(config: PlatformConfig) -> Self {
        config.to_string()
    }
}

/// One export batch as collected from the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Target definition files
    #[serde(default)]
    pub targets: Vec<PathBuf>,
    #[serde(default)]
    pub configurations: Vec<PlatformConfig>,
    /// Destination folder (path or URI)
    #[serde(default)]
    pub destination: String,
    /// Build one merged p2 repository instead of per-configuration exports
    #[serde(default)]
    pub p2_mirror: bool,
    #[serde(default)]
    pub options: MirrorOptions,
}

impl BatchConfig {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            targets: Vec::new(),
            configurations: Vec::new(),
            destination: destination.into(),
            p2_mirror: false,
            options: MirrorOptions::default(),
        }
    }

    /// Check the batch before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::Config(
                "Select one or more target platform definitions".to_string(),
            ));
        }

        if RepositoryLocation::from_destination(&self.destination).is_err() {
            return Err(Error::Config("Select valid p2 directory".to_string()));
        }

        for config in &self.configurations {
            config.validate()?;
        }

        if self.configurations.is_empty() {
            return Err(Error::Config("Add at least one configuration line".to_string()));
        }

        Ok(())
    }

    /// Number of target × configuration combinations
    pub fn combinations(&self) -> usize {
        self.targets.len() * self.configurations.len()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("Invalid batch file {}: {e}", path.display())))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize batch: {e}")))?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_batch() -> BatchConfig {
        let mut batch = BatchConfig::new("/tmp/p2-out");
        batch.targets.push(PathBuf::from("platform.target"));
        batch
            .configurations
            .push(PlatformConfig::new("linux", "gtk", "x86_64"));
        batch
    }

    #[test]
    fn test_mirror_options_defaults() {
        let options = MirrorOptions::default();
        assert_eq!(options.repository_name, "Target");
        assert!(options.compressed);
        assert!(options.atomic);
        assert!(options.append);
        assert!(!options.validate);
        assert!(!options.include_packed);
    }

    #[test]
    fn test_mirror_options_partial_toml() {
        let options: MirrorOptions = toml::from_str("validate = true\nrepository_name = \"Mirror\"").unwrap();
        assert!(options.validate);
        assert_eq!(options.repository_name, "Mirror");
        assert!(options.compressed);
    }

    #[test]
    fn test_platform_config_round_trip() {
        let config: PlatformConfig = "win32/win32/x86_64".parse().unwrap();
        assert_eq!(config, PlatformConfig::new("win32", "win32", "x86_64"));
        assert_eq!(config.to_string(), "win32/win32/x86_64");
        assert_eq!(config.dir_name(), "win32.win32.x86_64");
    }

    #[test]
    fn test_platform_config_requires_three_parts() {
        assert!("linux/gtk".parse::<PlatformConfig>().is_err());
        assert!("linux/gtk/x86_64/extra".parse::<PlatformConfig>().is_err());
        // Blank parts parse but do not validate
        let blank: PlatformConfig = "linux//x86_64".parse().unwrap();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_current_platform_is_complete() {
        let config = PlatformConfig::current();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_validation_order() {
        assert!(valid_batch().validate().is_ok());

        let mut no_targets = valid_batch();
        no_targets.targets.clear();
        let err = no_targets.validate().unwrap_err().to_string();
        assert!(err.contains("target platform definitions"));

        let mut no_dest = valid_batch();
        no_dest.destination = "   ".to_string();
        let err = no_dest.validate().unwrap_err().to_string();
        assert!(err.contains("valid p2 directory"));

        let mut missing_ws = valid_batch();
        missing_ws.configurations[0].ws.clear();
        let err = missing_ws.validate().unwrap_err().to_string();
        assert!(err.contains("'WS'"));

        let mut no_configs = valid_batch();
        no_configs.configurations.clear();
        let err = no_configs.validate().unwrap_err().to_string();
        assert!(err.contains("at least one configuration"));
    }

    #[test]
    fn test_batch_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("batch.toml");

        let mut batch = valid_batch();
        batch.p2_mirror = true;
        batch.options.validate = true;
        batch.save(&path).unwrap();

        let loaded = BatchConfig::load(&path).unwrap();
        assert_eq!(loaded, batch);
    }
}
