//! Lightweight global metrics for cloudbase.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Document API (append/fetch/update)
//! - Snapshots (write/fail)
//! - Retention (prune runs, removed files)
//! - Recovery

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Document API -----
static APPENDS_TOTAL: AtomicU64 = AtomicU64::new(0);
static FETCHES_TOTAL: AtomicU64 = AtomicU64::new(0);
static UPDATES_TOTAL: AtomicU64 = AtomicU64::new(0);
static ENTRIES_REPLACED: AtomicU64 = AtomicU64::new(0);
static BAD_REQUESTS: AtomicU64 = AtomicU64::new(0);

// ----- Snapshots -----
static SNAPSHOTS_WRITTEN: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_FAILURES: AtomicU64 = AtomicU64::new(0);
static LAST_SNAPSHOT_UNIX: AtomicU64 = AtomicU64::new(0);

// ----- Retention -----
static PRUNE_RUNS: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_REMOVED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_REMOVE_FAILURES: AtomicU64 = AtomicU64::new(0);

// ----- Recovery -----
static RECOVERED_ENTRIES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    // Document API
    pub appends_total: u64,
    pub fetches_total: u64,
    pub updates_total: u64,
    pub entries_replaced: u64,
    pub bad_requests: u64,

    // Snapshots
    pub snapshots_written: u64,
    pub snapshot_bytes_written: u64,
    pub snapshot_failures: u64,
    pub last_snapshot_unix: u64,

    // Retention
    pub prune_runs: u64,
    pub snapshots_removed: u64,
    pub snapshot_remove_failures: u64,

    // Recovery
    pub recovered_entries: u64,
}

impl MetricsSnapshot {
    pub fn avg_snapshot_bytes(&self) -> f64 {
        if self.snapshots_written == 0 {
            0.0
        } else {
            self.snapshot_bytes_written as f64 / self.snapshots_written as f64
        }
    }
}

// ----- Recorders (Document API) -----
pub fn record_append() {
    APPENDS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_fetch() {
    FETCHES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_update(replaced: usize) {
    UPDATES_TOTAL.fetch_add(1, Ordering::Relaxed);
    ENTRIES_REPLACED.fetch_add(replaced as u64, Ordering::Relaxed);
}

pub fn record_bad_request() {
    BAD_REQUESTS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Snapshots) -----
pub fn record_snapshot_written(bytes: usize, unix_secs: u64) {
    SNAPSHOTS_WRITTEN.fetch_add(1, Ordering::Relaxed);
    SNAPSHOT_BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
    LAST_SNAPSHOT_UNIX.store(unix_secs, Ordering::Relaxed);
}

pub fn record_snapshot_failure() {
    SNAPSHOT_FAILURES.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Retention) -----
pub fn record_prune(removed: usize, failed: usize) {
    PRUNE_RUNS.fetch_add(1, Ordering::Relaxed);
    SNAPSHOTS_REMOVED.fetch_add(removed as u64, Ordering::Relaxed);
    SNAPSHOT_REMOVE_FAILURES.fetch_add(failed as u64, Ordering::Relaxed);
}

// ----- Recorders (Recovery) -----
pub fn record_recovered(entries: usize) {
    RECOVERED_ENTRIES.store(entries as u64, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        appends_total: APPENDS_TOTAL.load(Ordering::Relaxed),
        fetches_total: FETCHES_TOTAL.load(Ordering::Relaxed),
        updates_total: UPDATES_TOTAL.load(Ordering::Relaxed),
        entries_replaced: ENTRIES_REPLACED.load(Ordering::Relaxed),
        bad_requests: BAD_REQUESTS.load(Ordering::Relaxed),

        snapshots_written: SNAPSHOTS_WRITTEN.load(Ordering::Relaxed),
        snapshot_bytes_written: SNAPSHOT_BYTES_WRITTEN.load(Ordering::Relaxed),
        snapshot_failures: SNAPSHOT_FAILURES.load(Ordering::Relaxed),
        last_snapshot_unix: LAST_SNAPSHOT_UNIX.load(Ordering::Relaxed),

        prune_runs: PRUNE_RUNS.load(Ordering::Relaxed),
        snapshots_removed: SNAPSHOTS_REMOVED.load(Ordering::Relaxed),
        snapshot_remove_failures: SNAPSHOT_REMOVE_FAILURES.load(Ordering::Relaxed),

        recovered_entries: RECOVERED_ENTRIES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    APPENDS_TOTAL.store(0, Ordering::Relaxed);
    FETCHES_TOTAL.store(0, Ordering::Relaxed);
    UPDATES_TOTAL.store(0, Ordering::Relaxed);
    ENTRIES_REPLACED.store(0, Ordering::Relaxed);
    BAD_REQUESTS.store(0, Ordering::Relaxed);

    SNAPSHOTS_WRITTEN.store(0, Ordering::Relaxed);
    SNAPSHOT_BYTES_WRITTEN.store(0, Ordering::Relaxed);
    SNAPSHOT_FAILURES.store(0, Ordering::Relaxed);
    LAST_SNAPSHOT_UNIX.store(0, Ordering::Relaxed);

    PRUNE_RUNS.store(0, Ordering::Relaxed);
    SNAPSHOTS_REMOVED.store(0, Ordering::Relaxed);
    SNAPSHOT_REMOVE_FAILURES.store(0, Ordering::Relaxed);

    RECOVERED_ENTRIES.store(0, Ordering::Relaxed);
}
