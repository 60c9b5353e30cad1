// src/repository/registration.rs

//! Transient repository registrations
//!
//! Loading a repository through a manager registers it for the rest of the process.
//! A mirror run must not leave such registrations behind, so every load it performs
//! goes through a [`RegistrationTracker`]. The tracker remembers each location that was
//! unknown to the registry before the run touched it, and [`RegistrationTracker::release`]
//! unregisters exactly those. Locations the caller had registered beforehand are never
//! removed.
//!
//! Release runs from a [`CleanupGuard`], so it happens on every exit path. The
//! destination lock is attached to the tracker and dropped only after unregistration.

use super::{
    ArtifactRepository, LoadFlags, MetadataRepository, RepositoryLocation, RepositoryManager,
};
use crate::agent::Agent;
use crate::error::Result;
use crate::lock::LocationLock;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Records the registrations one run adds
pub struct RegistrationTracker {
    agent: Arc<Agent>,
    artifact: Mutex<BTreeSet<RepositoryLocation>>,
    metadata: Mutex<BTreeSet<RepositoryLocation>>,
    held_lock: Mutex<Option<LocationLock>>,
}

impl RegistrationTracker {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            agent,
            artifact: Mutex::new(BTreeSet::new()),
            metadata: Mutex::new(BTreeSet::new()),
            held_lock: Mutex::new(None),
        }
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Load an artifact repository, tracking it if the registry did not know it
    pub fn load_artifact(
        &self,
        location: &RepositoryLocation,
        flags: LoadFlags,
    ) -> Result<Arc<dyn ArtifactRepository>> {
        let manager = self.agent.artifact_manager();
        track(&self.artifact, manager, location);
        manager.load_repository(location, flags)
    }

    /// Load a metadata repository, tracking it if the registry did not know it
    pub fn load_metadata(
        &self,
        location: &RepositoryLocation,
        flags: LoadFlags,
    ) -> Result<Arc<dyn MetadataRepository>> {
        let manager = self.agent.metadata_manager();
        track(&self.metadata, manager, location);
        manager.load_repository(location, flags)
    }

    pub fn tracked_artifacts(&self) -> Vec<RepositoryLocation> {
        self.artifact.lock().iter().cloned().collect()
    }

    /// Keep `lock` until [`release`](Self::release) has unregistered everything
    pub fn hold(&self, lock: LocationLock) {
        *self.held_lock.lock() = Some(lock);
    }

    /// Unregister every tracked location, then drop the held lock
    pub fn release(&self) {
        let artifacts = std::mem::take(&mut *self.artifact.lock());
        for location in &artifacts {
            self.agent.artifact_manager().remove_repository(location);
        }

        let metadata = std::mem::take(&mut *self.metadata.lock());
        for location in &metadata {
            self.agent.metadata_manager().remove_repository(location);
        }

        if !artifacts.is_empty() || !metadata.is_empty() {
            debug!(
                "Released {} artifact and {} metadata registrations",
                artifacts.len(),
                metadata.len()
            );
        }

        self.held_lock.lock().take();
    }

    /// Guard that calls [`release`](Self::release) when dropped
    pub fn guard(&self) -> CleanupGuard<'_> {
        CleanupGuard { tracker: self }
    }
}

/// Insert `location` into `set` unless `manager` already knows it
///
/// Locations known before the load attempt belong to someone else. A location that
/// fails to load is still tracked, so a repository later created there is released.
fn track<R: ?Sized>(
    set: &Mutex<BTreeSet<RepositoryLocation>>,
    manager: &RepositoryManager<R>,
    location: &RepositoryLocation,
) {
    let mut set = set.lock();
    if !set.contains(location) && !manager.contains(location) {
        set.insert(location.clone());
    }
}

/// Releases a tracker's registrations on scope exit
pub struct CleanupGuard<'a> {
    tracker: &'a RegistrationTracker,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{ArtifactDescriptor, SimpleArtifactRepository};
    use crate::unit::ArtifactKey;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn source(temp: &TempDir, name: &str) -> RepositoryLocation {
        let location = RepositoryLocation::from_path(&temp.path().join(name)).unwrap();
        let repo = SimpleArtifactRepository::create(&location, name, &BTreeMap::new()).unwrap();
        repo.write(&ArtifactDescriptor::new(ArtifactKey::bundle("a", "1")), b"a")
            .unwrap();
        location
    }

    #[test]
    fn test_release_removes_only_new_registrations() {
        let temp = TempDir::new().unwrap();
        let known = source(&temp, "known");
        let fresh = source(&temp, "fresh");

        let agent = Arc::new(Agent::with_defaults().unwrap());
        agent.artifact_manager().add_repository(&known);

        let tracker = RegistrationTracker::new(Arc::clone(&agent));
        {
            let _cleanup = tracker.guard();
            tracker.load_artifact(&known, LoadFlags::NONE).unwrap();
            tracker.load_artifact(&fresh, LoadFlags::NONE).unwrap();
            assert_eq!(tracker.tracked_artifacts(), vec![fresh.clone()]);
            assert!(agent.artifact_manager().contains(&fresh));
        }

        assert!(agent.artifact_manager().contains(&known));
        assert!(!agent.artifact_manager().contains(&fresh));
    }

    #[test]
    fn test_failed_load_is_still_tracked() {
        let temp = TempDir::new().unwrap();
        let missing = RepositoryLocation::from_path(&temp.path().join("missing")).unwrap();
        let agent = Arc::new(Agent::with_defaults().unwrap());
        let tracker = RegistrationTracker::new(Arc::clone(&agent));

        assert!(tracker.load_artifact(&missing, LoadFlags::NONE).is_err());
        assert_eq!(tracker.tracked_artifacts(), vec![missing]);
    }

    #[test]
    fn test_lock_dropped_after_release() {
        let temp = TempDir::new().unwrap();
        let destination = RepositoryLocation::from_path(temp.path()).unwrap();
        let agent = Arc::new(Agent::with_defaults().unwrap());
        let tracker = RegistrationTracker::new(Arc::clone(&agent));

        tracker.hold(agent.locks().acquire(&destination));
        assert!(agent.locks().is_held(&destination));

        tracker.release();
        assert!(!agent.locks().is_held(&destination));
    }
}
