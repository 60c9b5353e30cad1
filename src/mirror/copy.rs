// src/mirror/copy.rs

//! Artifact copy engine
//!
//! Transfers artifacts from a source repository into a destination repository and
//! reports the outcome per artifact in a [`Status`] tree. Failures of individual
//! artifacts never abort the run; cancellation is checked before each artifact.

use crate::progress::{CancellationToken, ProgressTracker};
use crate::repository::{ArtifactDescriptor, ArtifactRepository};
use crate::status::{MultiStatus, Status};
use crate::unit::ArtifactKey;
use tracing::{debug, warn};

/// One configured artifact transfer
pub struct ArtifactMirror<'a> {
    source: &'a dyn ArtifactRepository,
    destination: &'a dyn ArtifactRepository,
    keys: Option<Vec<ArtifactKey>>,
    validate: bool,
    include_packed: bool,
    verbose: bool,
}

impl<'a> ArtifactMirror<'a> {
    /// Mirror everything `source` contains unless restricted with [`with_keys`](Self::with_keys)
    pub fn new(source: &'a dyn ArtifactRepository, destination: &'a dyn ArtifactRepository) -> Self {
        Self {
            source,
            destination,
            keys: None,
            validate: false,
            include_packed: false,
            verbose: false,
        }
    }

    /// Restrict the transfer to exactly these keys
    pub fn with_keys(mut self, keys: impl IntoIterator<Item = ArtifactKey>) -> Self {
        self.keys = Some(keys.into_iter().collect());
        self
    }

    /// Re-read each copied artifact from the destination and compare
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn include_packed(mut self, include_packed: bool) -> Self {
        self.include_packed = include_packed;
        self
    }

    /// Also record successful and skipped artifacts in the result
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the transfer
    pub fn run(&self, progress: &dyn ProgressTracker, cancel: &CancellationToken) -> Status {
        let keys = match &self.keys {
            Some(keys) => keys.clone(),
            None => self.source.keys(),
        };
        progress.set_length(keys.len() as u64);

        let mut result = MultiStatus::new(format!(
            "Mirroring {} artifacts into {}",
            keys.len(),
            self.destination.location()
        ));

        let mut copied = 0usize;
        for key in &keys {
            if cancel.is_cancelled() {
                result.add(Status::cancel(format!(
                    "Artifact mirroring cancelled after {copied} of {} artifacts",
                    keys.len()
                )));
                break;
            }

            progress.set_message(&key.id);
            let status = self.mirror_key(key);
            if status.exceeds_info() {
                warn!("{}", status.message());
                result.add(status);
            } else if self.verbose {
                result.add(status);
            }
            copied += 1;
            progress.increment(1);
        }

        debug!("Processed {} of {} artifacts", copied, keys.len());
        result.finish()
    }

    fn mirror_key(&self, key: &ArtifactKey) -> Status {
        if let Err(e) = key.validate() {
            return Status::error(format!("Rejected artifact: {e}"));
        }

        if self.destination.contains(key) {
            return Status::info(format!("Artifact {key} is already in the destination"));
        }

        let descriptors: Vec<_> = self
            .source
            .descriptors(key)
            .into_iter()
            .filter(|d| self.include_packed || !d.is_packed())
            .collect();
        if descriptors.is_empty() {
            return Status::error(format!("Artifact not found in source repositories: {key}"));
        }

        let mut statuses: Vec<Status> = descriptors.iter().map(|d| self.copy(d)).collect();
        if statuses.len() == 1 {
            return statuses.remove(0);
        }

        let mut multi = MultiStatus::new(format!("Mirroring {key}"));
        for status in statuses {
            multi.add(status);
        }
        multi.finish()
    }

    fn copy(&self, descriptor: &ArtifactDescriptor) -> Status {
        let content = match self.source.read(descriptor) {
            Ok(content) => content,
            Err(e) => return Status::error(format!("Failed to read {descriptor}: {e}")),
        };

        if let Err(e) = descriptor.verify(&content) {
            return Status::error(e.to_string());
        }

        if let Err(e) = self.destination.write(descriptor, &content) {
            return Status::error(format!("Failed to write {descriptor}: {e}"));
        }

        if self.validate {
            match self.destination.read(descriptor) {
                Ok(copied) if copied == content => {}
                Ok(_) => {
                    return Status::error(format!(
                        "Validation failed for {descriptor}: destination content differs"
                    ));
                }
                Err(e) => {
                    return Status::error(format!("Validation failed for {descriptor}: {e}"));
                }
            }
        }

        Status::ok(format!("Mirrored {descriptor}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::repository::{RepositoryLocation, SimpleArtifactRepository};
    use crate::status::Severity;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn repository(temp: &TempDir, name: &str) -> SimpleArtifactRepository {
        let location = RepositoryLocation::from_path(&temp.path().join(name)).unwrap();
        SimpleArtifactRepository::create(&location, name, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_full_mirror_without_keys() {
        let temp = TempDir::new().unwrap();
        let source = repository(&temp, "source");
        let destination = repository(&temp, "dest");
        for id in ["a", "b", "c"] {
            source
                .write(&ArtifactDescriptor::new(ArtifactKey::bundle(id, "1")), id.as_bytes())
                .unwrap();
        }

        let progress = SilentProgress::new();
        let status = ArtifactMirror::new(&source, &destination).run(&progress, &CancellationToken::new());

        assert!(status.is_ok());
        assert_eq!(destination.keys().len(), 3);
        assert_eq!(progress.position(), 3);
    }

    #[test]
    fn test_missing_key_is_error_child_and_run_continues() {
        let temp = TempDir::new().unwrap();
        let source = repository(&temp, "source");
        let destination = repository(&temp, "dest");
        let present = ArtifactKey::bundle("present", "1");
        source.write(&ArtifactDescriptor::new(present.clone()), b"p").unwrap();

        let status = ArtifactMirror::new(&source, &destination)
            .with_keys([ArtifactKey::bundle("absent", "1"), present.clone()])
            .run(&SilentProgress::new(), &CancellationToken::new());

        assert_eq!(status.severity(), Severity::Error);
        assert_eq!(status.children().len(), 1);
        assert!(status.children()[0].message().contains("absent"));
        assert!(destination.contains(&present));
    }

    #[test]
    fn test_existing_artifacts_are_skipped() {
        let temp = TempDir::new().unwrap();
        let source = repository(&temp, "source");
        let destination = repository(&temp, "dest");
        let key = ArtifactKey::bundle("a", "1");
        source.write(&ArtifactDescriptor::new(key.clone()), b"new").unwrap();
        destination.write(&ArtifactDescriptor::new(key.clone()), b"old").unwrap();

        let status = ArtifactMirror::new(&source, &destination)
            .verbose(true)
            .run(&SilentProgress::new(), &CancellationToken::new());

        assert_eq!(status.severity(), Severity::Info);
        let descriptor = &destination.descriptors(&key)[0];
        assert_eq!(destination.read(descriptor).unwrap(), b"old");
    }

    #[test]
    fn test_cancelled_before_start_copies_nothing() {
        let temp = TempDir::new().unwrap();
        let source = repository(&temp, "source");
        let destination = repository(&temp, "dest");
        source
            .write(&ArtifactDescriptor::new(ArtifactKey::bundle("a", "1")), b"a")
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let status = ArtifactMirror::new(&source, &destination).run(&SilentProgress::new(), &cancel);

        assert_eq!(status.severity(), Severity::Cancel);
        assert!(destination.keys().is_empty());
    }

    #[test]
    fn test_packed_variants_only_on_request() {
        let temp = TempDir::new().unwrap();
        let source = repository(&temp, "source");
        let key = ArtifactKey::bundle("a", "1");
        source.write(&ArtifactDescriptor::new(key.clone()), b"jar").unwrap();
        source.write(&ArtifactDescriptor::packed(key.clone()), b"pack").unwrap();

        let plain = repository(&temp, "plain");
        ArtifactMirror::new(&source, &plain).run(&SilentProgress::new(), &CancellationToken::new());
        assert_eq!(plain.descriptors(&key).len(), 1);

        let with_packed = repository(&temp, "packed");
        let status = ArtifactMirror::new(&source, &with_packed)
            .include_packed(true)
            .validate(true)
            .run(&SilentProgress::new(), &CancellationToken::new());
        assert!(status.is_ok());
        assert_eq!(with_packed.descriptors(&key).len(), 2);
    }

    #[test]
    fn test_unsafe_key_is_error_child() {
        let temp = TempDir::new().unwrap();
        let source = repository(&temp, "source");
        let dest_location = RepositoryLocation::from_path(&temp.path().join("x/y/out")).unwrap();
        let destination =
            SimpleArtifactRepository::create(&dest_location, "out", &BTreeMap::new()).unwrap();
        let good = ArtifactKey::bundle("good", "1");
        source.write(&ArtifactDescriptor::new(good.clone()), b"g").unwrap();

        let status = ArtifactMirror::new(&source, &destination)
            .with_keys([ArtifactKey::bundle("../../../escaped", "1"), good.clone()])
            .run(&SilentProgress::new(), &CancellationToken::new());

        assert_eq!(status.severity(), Severity::Error);
        assert_eq!(status.children().len(), 1);
        assert!(status.children()[0].message().contains("escaped"));
        assert!(destination.contains(&good));
        assert!(!temp.path().join("x/escaped_1.jar").exists());
    }

    #[test]
    fn test_corrupt_source_payload_rejected() {
        let temp = TempDir::new().unwrap();
        let source = repository(&temp, "source");
        let destination = repository(&temp, "dest");
        let key = ArtifactKey::bundle("a", "1");
        source.write(&ArtifactDescriptor::new(key.clone()), b"original").unwrap();
        std::fs::write(source.root().join("plugins/a_1.jar"), b"tampered").unwrap();

        let status = ArtifactMirror::new(&source, &destination)
            .run(&SilentProgress::new(), &CancellationToken::new());

        assert_eq!(status.severity(), Severity::Error);
        assert!(!destination.contains(&key));
    }
}
