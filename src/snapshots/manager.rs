//! Snapshot manager: TakeSnapshot.
//!
//! The table is serialized under its lock, the file is written after the
//! lock is released. A failed snapshot is logged and counted, never raised:
//! the next timer tick simply tries again.
//!
//! Snapshots of one manager never overlap (timer vs `snapshot_now`).
//! The failure streak behind `/ready` is per manager; `metrics` keeps only
//! process-wide totals.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::StoreError;
use crate::metrics::{record_snapshot_failure, record_snapshot_written};
use crate::table::DocumentTable;
use crate::util::now_secs;

use super::naming::snapshot_file_name;
use super::registry::SnapshotRegistry;
use super::store::SnapshotStore;

/// Source of the unix-seconds timestamp embedded in snapshot names.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub struct SnapshotManager {
    store: Arc<dyn SnapshotStore>,
    table: Arc<DocumentTable>,
    registry: Arc<SnapshotRegistry>,
    clock: Clock,
    // сериализует TakeSnapshot
    write_lock: Mutex<()>,
    consecutive_failures: AtomicU64,
}

impl SnapshotManager {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        table: Arc<DocumentTable>,
        registry: Arc<SnapshotRegistry>,
    ) -> Self {
        Self {
            store,
            table,
            registry,
            clock: Arc::new(now_secs),
            write_lock: Mutex::new(()),
            consecutive_failures: AtomicU64::new(0),
        }
    }

    /// Replace the wall clock (tests, replay tooling).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<SnapshotRegistry> {
        &self.registry
    }

    /// Failed snapshots since this manager's last success.
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Healthy while fewer than `limit` snapshots in a row have failed.
    pub fn persistence_healthy(&self, limit: u64) -> bool {
        self.consecutive_failures() < limit.max(1)
    }

    /// Write a snapshot and track it. Errors come back as `StoreError::TransientIo`
    /// and leave the registry untouched.
    pub fn try_take_snapshot(&self) -> Result<PathBuf> {
        let _serial = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let ts = (self.clock)();
        let name = snapshot_file_name(ts);

        let bytes = self
            .table
            .export_json()
            .map_err(|e| StoreError::transient("snapshot serialize", e))?;

        let path = self
            .store
            .write(&name, &bytes)
            .with_context(|| format!("save snapshot {}", name))
            .map_err(|e| StoreError::transient("snapshot write", e))?;

        if !self.registry.track(path.clone()) {
            debug!("snapshot: {} overwritten within the same second", name);
        }
        record_snapshot_written(bytes.len(), ts);
        debug!("snapshot: saved {} ({} B)", path.display(), bytes.len());
        Ok(path)
    }

    /// Timer entry point: best-effort, never fails.
    pub fn take_snapshot(&self) -> Option<PathBuf> {
        match self.try_take_snapshot() {
            Ok(p) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                Some(p)
            }
            Err(e) => {
                self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
                record_snapshot_failure();
                warn!("cannot save snapshot: {:#}", e);
                None
            }
        }
    }
}
