//! In-memory registry of snapshot paths for retention accounting.
//!
//! Ordered oldest first. Not the source of truth for recovery: recovery
//! re-scans the directory. A path already tracked is not tracked twice,
//! since two snapshots within one second share a file name.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    paths: Mutex<Vec<PathBuf>>,
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a new path. Returns false if it was already tracked.
    pub fn track(&self, path: PathBuf) -> bool {
        let mut g = self.lock();
        if g.contains(&path) {
            return false;
        }
        g.push(path);
        true
    }

    /// Track several paths, in the given order.
    pub fn track_all<I: IntoIterator<Item = PathBuf>>(&self, paths: I) {
        let mut g = self.lock();
        for p in paths {
            if !g.contains(&p) {
                g.push(p);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
