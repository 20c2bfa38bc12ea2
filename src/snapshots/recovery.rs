//! Startup recovery: pick the newest snapshot and load it.
//!
//! Strict, unlike the runtime path: a name that carries the marker but has no
//! numeric timestamp, an unreadable directory or an unreadable newest
//! snapshot all abort startup with `StoreError::StartupIntegrity`. Serving
//! partial state derived from a broken directory is worse than not serving.

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::PathBuf;

use crate::error::StoreError;
use crate::metrics::record_recovered;
use crate::table::{DocumentTable, TableMap};

use super::naming::{is_partial_name, is_snapshot_name, parse_snapshot_ts};
use super::registry::SnapshotRegistry;
use super::store::SnapshotStore;

/// One qualifying file found in the snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub ts: u64,
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Qualifying snapshot files found.
    pub discovered: usize,
    pub loaded: Option<SnapshotFile>,
    pub keys: usize,
    pub entries: usize,
}

/// All qualifying snapshots, oldest first. Fails on the first bad name.
pub fn scan_snapshots(store: &dyn SnapshotStore) -> Result<Vec<SnapshotFile>> {
    let mut out = Vec::new();
    for name in store.list()? {
        if !is_snapshot_name(&name) {
            continue;
        }
        let ts = parse_snapshot_ts(&name)?;
        let path = store.path_of(&name);
        out.push(SnapshotFile { ts, name, path });
    }
    out.sort_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.name.cmp(&b.name)));
    Ok(out)
}

/// Read and decode one snapshot file.
pub fn load_snapshot(store: &dyn SnapshotStore, name: &str) -> Result<TableMap> {
    let bytes = store.read(name)?;
    let map: TableMap = serde_json::from_slice(&bytes)
        .with_context(|| format!("decode snapshot {}", name))?;
    Ok(map)
}

/// Recovery Loader. Creates the directory when missing, otherwise loads the
/// newest snapshot into `table` and tracks every qualifying file in `registry`.
pub fn recover(
    store: &dyn SnapshotStore,
    table: &DocumentTable,
    registry: &SnapshotRegistry,
) -> Result<RecoveryReport> {
    let created = store.ensure_dir().map_err(StoreError::startup)?;
    if created {
        info!("recovery: created snapshot dir {}", store.dir().display());
        return Ok(RecoveryReport::default());
    }

    let names = store.list().map_err(StoreError::startup)?;
    for name in names.iter().filter(|n| is_partial_name(n)) {
        // leftover of an interrupted write
        if let Err(e) = store.remove(&store.path_of(name)) {
            warn!("recovery: cannot remove stale {}: {:#}", name, e);
        }
    }

    let files = scan_snapshots(store).map_err(StoreError::startup)?;
    let newest = match files.last() {
        Some(f) => f.clone(),
        None => {
            info!("recovery: no snapshots in {}, starting empty", store.dir().display());
            return Ok(RecoveryReport::default());
        }
    };

    let map = load_snapshot(store, &newest.name).map_err(StoreError::startup)?;
    let keys = map.len();
    let entries: usize = map.values().map(Vec::len).sum();
    table.replace_all(map);
    registry.track_all(files.iter().map(|f| f.path.clone()));
    record_recovered(entries);

    info!(
        "recovery: loaded {} ({} key(s), {} entr(ies)); tracking {} snapshot(s)",
        newest.path.display(),
        keys,
        entries,
        files.len()
    );

    Ok(RecoveryReport {
        discovered: files.len(),
        loaded: Some(newest),
        keys,
        entries,
    })
}
