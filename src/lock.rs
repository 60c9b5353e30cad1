// src/lock.rs

//! Per-location exclusive locks
//!
//! Two mirror runs must not write the same destination at the same time, whether
//! they share an agent, use different agents, or run in different processes.
//!
//! # Lock Strategy
//!
//! - **In-process**: each agent owns a [`LocationLocks`] table, so runs on one agent
//!   queue without touching the filesystem
//! - **Cross-process**: local destinations are also locked with `flock(LOCK_EX)` on
//!   `<destination>/.tpexport.lock`, which serializes runs of separate agents and
//!   separate processes
//!
//! # Example
//!
//! ```ignore
//! use tpexport::lock::LocationLocks;
//!
//! let locks = Arc::new(LocationLocks::new());
//! let guard = locks.acquire_exclusive(&destination)?;
//! // ... write destination ...
//! // Both locks released on drop
//! ```

use crate::error::Result;
use crate::repository::RepositoryLocation;
use fs2::FileExt;
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Lock file created in local destination folders
pub const LOCK_FILE: &str = ".tpexport.lock";

/// Table of currently held location locks
#[derive(Debug, Default)]
pub struct LocationLocks {
    held: Mutex<BTreeSet<RepositoryLocation>>,
    released: Condvar,
}

impl LocationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `location`, blocking while another holder has it
    pub fn acquire(self: &Arc<Self>, location: &RepositoryLocation) -> LocationLock {
        let mut held = self.held.lock();
        while held.contains(location) {
            debug!("Waiting for lock on {}", location);
            self.released.wait(&mut held);
        }
        held.insert(location.clone());
        debug!("Acquired lock on {}", location);

        LocationLock {
            locks: Arc::clone(self),
            location: location.clone(),
            file: None,
        }
    }

    /// Acquire the in-process lock, then the lock file of a local `location`
    ///
    /// Creates the destination folder if needed. Blocks while another holder, in
    /// this process or another one, has the lock.
    pub fn acquire_exclusive(self: &Arc<Self>, location: &RepositoryLocation) -> Result<LocationLock> {
        let mut lock = self.acquire(location);
        if let Some(root) = location.to_file_path() {
            lock.file = Some(lock_file(&root)?);
            debug!("Acquired lock file in {}", root.display());
        }
        Ok(lock)
    }

    /// Acquire the lock for `location` unless it is already held
    pub fn try_acquire(self: &Arc<Self>, location: &RepositoryLocation) -> Option<LocationLock> {
        let mut held = self.held.lock();
        if !held.insert(location.clone()) {
            return None;
        }
        Some(LocationLock {
            locks: Arc::clone(self),
            location: location.clone(),
            file: None,
        })
    }

    pub fn is_held(&self, location: &RepositoryLocation) -> bool {
        self.held.lock().contains(location)
    }
}

/// Open and `flock` the lock file in `root`
fn lock_file(root: &Path) -> Result<File> {
    fs::create_dir_all(root)?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(root.join(LOCK_FILE))?;
    file.lock_exclusive()?;
    Ok(file)
}

/// Exclusive hold on one location, released on drop
#[derive(Debug)]
pub struct LocationLock {
    locks: Arc<LocationLocks>,
    location: RepositoryLocation,
    /// Open lock file; closing it releases the `flock`
    file: Option<File>,
}

impl LocationLock {
    pub fn location(&self) -> &RepositoryLocation {
        &self.location
    }
}

impl Drop for LocationLock {
    fn drop(&mut self) {
        self.file.take();
        self.locks.held.lock().remove(&self.location);
        self.locks.released.notify_all();
        debug!("Released lock on {}", self.location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use tempfile::TempDir;

    fn location() -> RepositoryLocation {
        RepositoryLocation::parse("/tmp/tpexport-lock-test").unwrap()
    }

    #[test]
    fn test_lock_released_on_drop() {
        let locks = Arc::new(LocationLocks::new());
        let lock = locks.acquire(&location());
        assert!(locks.is_held(&location()));
        assert!(locks.try_acquire(&location()).is_none());

        drop(lock);
        assert!(!locks.is_held(&location()));
        assert!(locks.try_acquire(&location()).is_some());
    }

    #[test]
    fn test_acquire_waits_for_holder() {
        let locks = Arc::new(LocationLocks::new());
        let first = locks.acquire(&location());

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let _second = locks.acquire(&location());
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        drop(first);
        waiter.join().unwrap();
        assert!(!locks.is_held(&location()));
    }

    #[test]
    fn test_lock_file_excludes_other_tables() {
        let temp = TempDir::new().unwrap();
        let destination = RepositoryLocation::from_path(&temp.path().join("out")).unwrap();
        let first_table = Arc::new(LocationLocks::new());
        let second_table = Arc::new(LocationLocks::new());

        let first = first_table.acquire_exclusive(&destination).unwrap();
        assert!(temp.path().join("out").join(LOCK_FILE).is_file());

        let waiter = {
            let destination = destination.clone();
            thread::spawn(move || {
                let _second = second_table.acquire_exclusive(&destination).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!waiter.is_finished());

        drop(first);
        waiter.join().unwrap();
    }

    #[test]
    fn test_lock_file_failure_releases_table_entry() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let destination = RepositoryLocation::from_path(&blocker).unwrap();
        let locks = Arc::new(LocationLocks::new());

        assert!(locks.acquire_exclusive(&destination).is_err());
        assert!(!locks.is_held(&destination));
    }
}
