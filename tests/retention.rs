use anyhow::{anyhow, Result};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use cloudbase::metrics;
use cloudbase::scheduler::run_cycle;
use cloudbase::server::exporter::{build_metrics, ExporterState};
use cloudbase::snapshots::{
    scan_snapshots, Clock, DirStore, RetentionCleaner, SnapshotManager, SnapshotRegistry,
    SnapshotStore,
};
use cloudbase::{DocumentTable, RetentionPolicy};

/// Уникальный корневой путь для теста.
fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("cb-{}-{}-{}", prefix, pid, t))
}

fn stepping_clock(start: u64) -> Clock {
    let c = Arc::new(AtomicU64::new(start));
    Arc::new(move || c.fetch_add(1, Ordering::SeqCst))
}

/// DirStore with switchable write/remove failures.
struct FlakyStore {
    inner: DirStore,
    fail_write: AtomicBool,
    fail_remove: AtomicBool,
}

impl FlakyStore {
    fn new(dir: &Path) -> Self {
        Self {
            inner: DirStore::new(dir),
            fail_write: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
        }
    }
}

impl SnapshotStore for FlakyStore {
    fn dir(&self) -> &Path {
        self.inner.dir()
    }
    fn ensure_dir(&self) -> Result<bool> {
        self.inner.ensure_dir()
    }
    fn list(&self) -> Result<Vec<String>> {
        self.inner.list()
    }
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.inner.read(name)
    }
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(anyhow!("injected write failure for {}", name));
        }
        self.inner.write(name, bytes)
    }
    fn remove(&self, path: &Path) -> Result<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(anyhow!("injected remove failure for {}", path.display()));
        }
        self.inner.remove(path)
    }
}

struct Rig {
    store: Arc<FlakyStore>,
    table: Arc<DocumentTable>,
    registry: Arc<SnapshotRegistry>,
    manager: SnapshotManager,
    cleaner: RetentionCleaner,
}

fn rig(root: &Path, threshold: usize, policy: RetentionPolicy) -> Result<Rig> {
    let store = Arc::new(FlakyStore::new(root));
    store.ensure_dir()?;
    let dyn_store: Arc<dyn SnapshotStore> = store.clone();
    let table = Arc::new(DocumentTable::new());
    let registry = Arc::new(SnapshotRegistry::new());
    let manager = SnapshotManager::new(
        Arc::clone(&dyn_store),
        Arc::clone(&table),
        Arc::clone(&registry),
    )
    .with_clock(stepping_clock(1000));
    let cleaner = RetentionCleaner::new(dyn_store, Arc::clone(&registry), threshold, policy);
    Ok(Rig {
        store,
        table,
        registry,
        manager,
        cleaner,
    })
}

fn names_on_disk(store: &dyn SnapshotStore) -> Result<Vec<String>> {
    Ok(scan_snapshots(store)?.into_iter().map(|f| f.name).collect())
}

#[test]
fn keep_newest_leaves_threshold_files() -> Result<()> {
    let root = unique_root("keep-newest");
    let r = rig(&root, 3, RetentionPolicy::KeepNewest)?;

    for i in 0..6 {
        r.table.append("k", json!(i));
        run_cycle(&r.manager, &r.cleaner);
        assert!(r.registry.len() <= 3);
    }

    assert_eq!(
        names_on_disk(r.store.as_ref())?,
        vec!["1003.cloudbase", "1004.cloudbase", "1005.cloudbase"]
    );
    assert_eq!(r.registry.len(), 3);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn at_threshold_nothing_is_removed() -> Result<()> {
    let root = unique_root("at-threshold");
    let r = rig(&root, 2, RetentionPolicy::KeepNewest)?;

    r.manager.try_take_snapshot()?;
    r.manager.try_take_snapshot()?;
    let rep = r.cleaner.prune();
    assert!(rep.is_noop());
    assert_eq!(names_on_disk(r.store.as_ref())?.len(), 2);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn legacy_keeps_first_and_forgets_all() -> Result<()> {
    let root = unique_root("legacy");
    let r = rig(&root, 3, RetentionPolicy::Legacy)?;

    for _ in 0..4 {
        r.manager.try_take_snapshot()?;
    }
    let rep = r.cleaner.prune();
    assert_eq!(rep.removed.len(), 3);
    assert!(r.registry.is_empty());
    assert_eq!(names_on_disk(r.store.as_ref())?, vec!["1000.cloudbase"]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn failed_removals_stay_tracked() -> Result<()> {
    let root = unique_root("remove-fail");
    let r = rig(&root, 1, RetentionPolicy::KeepNewest)?;

    r.manager.try_take_snapshot()?;
    r.manager.try_take_snapshot()?;
    r.store.fail_remove.store(true, Ordering::SeqCst);
    let rep = r.cleaner.prune();
    assert!(rep.removed.is_empty());
    assert_eq!(rep.failed.len(), 1);
    assert_eq!(r.registry.len(), 2);

    // следующий цикл дочищает
    r.store.fail_remove.store(false, Ordering::SeqCst);
    let rep = r.cleaner.prune();
    assert_eq!(rep.removed, vec![root.join("1000.cloudbase")]);
    assert_eq!(r.registry.paths(), vec![root.join("1001.cloudbase")]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn failed_snapshot_is_counted_and_not_tracked() -> Result<()> {
    let root = unique_root("write-fail");
    let r = rig(&root, 5, RetentionPolicy::KeepNewest)?;
    r.table.append("k", json!(1));

    let before = metrics::snapshot().snapshot_failures;
    r.store.fail_write.store(true, Ordering::SeqCst);
    assert!(r.manager.take_snapshot().is_none());
    assert!(r.manager.try_take_snapshot().is_err());
    assert!(metrics::snapshot().snapshot_failures >= before + 1);
    assert!(r.registry.is_empty());
    assert!(names_on_disk(r.store.as_ref())?.is_empty());

    // сбой не ломает следующий цикл
    r.store.fail_write.store(false, Ordering::SeqCst);
    assert!(r.manager.take_snapshot().is_some());
    assert_eq!(r.registry.len(), 1);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn failure_streak_is_per_manager() -> Result<()> {
    let root_a = unique_root("streak-a");
    let root_b = unique_root("streak-b");
    let a = rig(&root_a, 5, RetentionPolicy::KeepNewest)?;
    let b = rig(&root_b, 5, RetentionPolicy::KeepNewest)?;

    a.store.fail_write.store(true, Ordering::SeqCst);
    for _ in 0..5 {
        assert!(a.manager.take_snapshot().is_none());
    }
    assert_eq!(a.manager.consecutive_failures(), 5);
    assert!(!a.manager.persistence_healthy(3));

    // успех соседнего стора не лечит A
    assert!(b.manager.take_snapshot().is_some());
    assert!(b.manager.persistence_healthy(3));
    assert_eq!(a.manager.consecutive_failures(), 5);
    assert!(!a.manager.persistence_healthy(3));

    // и наоборот: сбои A не трогают B
    assert!(a.manager.take_snapshot().is_none());
    assert_eq!(b.manager.consecutive_failures(), 0);

    // свой успех сбрасывает серию
    a.store.fail_write.store(false, Ordering::SeqCst);
    assert!(a.manager.take_snapshot().is_some());
    assert_eq!(a.manager.consecutive_failures(), 0);
    assert!(a.manager.persistence_healthy(3));

    let _ = fs::remove_dir_all(&root_a);
    let _ = fs::remove_dir_all(&root_b);
    Ok(())
}

#[test]
fn readiness_follows_own_manager() -> Result<()> {
    let root_a = unique_root("ready-a");
    let root_b = unique_root("ready-b");

    let store_a = Arc::new(FlakyStore::new(&root_a));
    store_a.ensure_dir()?;
    store_a.fail_write.store(true, Ordering::SeqCst);
    let table_a = Arc::new(DocumentTable::new());
    let reg_a = Arc::new(SnapshotRegistry::new());
    let mgr_a = Arc::new(SnapshotManager::new(
        store_a.clone(),
        Arc::clone(&table_a),
        Arc::clone(&reg_a),
    ));

    let b = rig(&root_b, 5, RetentionPolicy::KeepNewest)?;

    let state_a = ExporterState {
        serving: Arc::new(AtomicBool::new(true)),
        table: table_a,
        registry: reg_a,
        manager: Arc::clone(&mgr_a),
        unhealthy_after: 3,
    };
    assert!(state_a.is_ready());

    for _ in 0..3 {
        mgr_a.take_snapshot();
    }
    assert!(b.manager.take_snapshot().is_some());
    assert!(!state_a.is_ready(), "never persisted, must not be ready");
    assert!(build_metrics(&state_a).contains("cloudbase_snapshot_consecutive_failures 3"));

    let _ = fs::remove_dir_all(&root_a);
    let _ = fs::remove_dir_all(&root_b);
    Ok(())
}
