use anyhow::Result;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cloudbase::snapshots::{
    recover, Clock, DirStore, SnapshotManager, SnapshotRegistry, SnapshotStore,
};
use cloudbase::{DocumentTable, StoreError};

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

#[test]
fn snapshot_then_recover_roundtrip() -> Result<()> {
    let root = unique_root("roundtrip");
    let store: Arc<dyn SnapshotStore> = Arc::new(DirStore::new(&root));
    store.ensure_dir()?;

    let table = Arc::new(DocumentTable::new());
    table.append("users", json!({"id": 1, "name": "a"}));
    table.append("users", json!({"id": 2}));
    table.append("tags", json!(["x", "y"]));

    let reg = Arc::new(SnapshotRegistry::new());
    let mgr = SnapshotManager::new(Arc::clone(&store), Arc::clone(&table), Arc::clone(&reg))
        .with_clock(stepping_clock(1_700_000_000));
    let path = mgr.try_take_snapshot()?;
    assert_eq!(path, root.join("1700000000.cloudbase"));
    assert_eq!(reg.len(), 1);

    // файл: объект ключ -> массив
    let on_disk: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
    assert_eq!(on_disk["users"].as_array().map(Vec::len), Some(2));

    let fresh = DocumentTable::new();
    let reg2 = SnapshotRegistry::new();
    let rep = recover(store.as_ref(), &fresh, &reg2)?;
    assert_eq!(rep.discovered, 1);
    assert_eq!(rep.keys, 2);
    assert_eq!(rep.entries, 3);
    assert_eq!(fresh.to_map(), table.to_map());
    assert_eq!(reg2.paths(), vec![path]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn newest_is_chosen_numerically() -> Result<()> {
    let root = unique_root("newest");
    fs::create_dir_all(&root)?;
    fs::write(root.join("100.cloudbase"), br#"{"k":["old"]}"#)?;
    fs::write(root.join("99.cloudbase"), br#"{"k":["older"]}"#)?;
    fs::write(root.join("200.cloudbase"), br#"{"k":["new"]}"#)?;
    fs::write(root.join("notes.txt"), b"ignored")?;

    let store = DirStore::new(&root);
    let table = DocumentTable::new();
    let reg = SnapshotRegistry::new();
    let rep = recover(&store, &table, &reg)?;

    assert_eq!(rep.loaded.as_ref().map(|f| f.ts), Some(200));
    assert_eq!(table.fetch_all("k"), vec![json!("new")]);
    assert_eq!(reg.len(), 3, "every qualifying file is tracked");
    assert_eq!(reg.paths()[0], root.join("99.cloudbase"));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn missing_dir_is_created_and_table_empty() -> Result<()> {
    let root = unique_root("missing");
    let store = DirStore::new(&root);
    let table = DocumentTable::new();
    let reg = SnapshotRegistry::new();

    let rep = recover(&store, &table, &reg)?;
    assert!(root.is_dir());
    assert!(rep.loaded.is_none());
    assert_eq!(table.stats().keys, 0);
    assert!(reg.is_empty());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&root)?.permissions().mode() & 0o777;
        // umask может только убрать биты
        assert_eq!(mode & !0o740, 0, "mode {:o}", mode);
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn bad_snapshot_name_is_fatal() -> Result<()> {
    let root = unique_root("badname");
    fs::create_dir_all(&root)?;
    fs::write(root.join("100.cloudbase"), b"{}")?;
    fs::write(root.join("abc.cloudbase"), b"{}")?;

    let store = DirStore::new(&root);
    let err = recover(&store, &DocumentTable::new(), &SnapshotRegistry::new())
        .expect_err("bad name must abort recovery");
    let se = err.downcast_ref::<StoreError>().expect("typed error");
    assert!(se.is_fatal());
    assert!(format!("{:#}", err).contains("abc.cloudbase"));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn corrupt_newest_is_fatal() -> Result<()> {
    let root = unique_root("corrupt");
    fs::create_dir_all(&root)?;
    fs::write(root.join("100.cloudbase"), br#"{"k":[1]}"#)?;
    fs::write(root.join("200.cloudbase"), b"{truncated")?;

    let store = DirStore::new(&root);
    let err = recover(&store, &DocumentTable::new(), &SnapshotRegistry::new())
        .expect_err("corrupt newest must abort recovery");
    assert!(err.downcast_ref::<StoreError>().is_some_and(StoreError::is_fatal));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn stale_partials_are_removed() -> Result<()> {
    let root = unique_root("partial");
    fs::create_dir_all(&root)?;
    fs::write(root.join("100.cloudbase"), br#"{"k":[1]}"#)?;
    fs::write(root.join("101.partial"), b"{\"k\":[1,")?;

    let store = DirStore::new(&root);
    let table = DocumentTable::new();
    let reg = SnapshotRegistry::new();
    let rep = recover(&store, &table, &reg)?;

    assert_eq!(rep.discovered, 1);
    assert!(!root.join("101.partial").exists());
    assert_eq!(table.fetch_all("k"), vec![json!(1)]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn same_second_snapshots_share_one_entry() -> Result<()> {
    let root = unique_root("samesec");
    let store: Arc<dyn SnapshotStore> = Arc::new(DirStore::new(&root));
    store.ensure_dir()?;

    let table = Arc::new(DocumentTable::new());
    let reg = Arc::new(SnapshotRegistry::new());
    let mgr = SnapshotManager::new(Arc::clone(&store), Arc::clone(&table), Arc::clone(&reg))
        .with_clock(Arc::new(|| 42));

    table.append("k", json!(1));
    mgr.try_take_snapshot()?;
    table.append("k", json!(2));
    let p = mgr.try_take_snapshot()?;

    assert_eq!(reg.len(), 1);
    let on_disk: serde_json::Value = serde_json::from_slice(&fs::read(&p)?)?;
    assert_eq!(on_disk, json!({"k": [1, 2]}), "later write wins");

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn failed_write_leaves_no_partial() -> Result<()> {
    let root = unique_root("failed-write");
    let store = DirStore::new(&root);
    store.ensure_dir()?;
    // каталог на месте снапшота: rename упадёт
    fs::create_dir_all(root.join("7.cloudbase"))?;

    assert!(store.write("7.cloudbase", b"{}").is_err());
    assert!(!root.join("7.partial").exists(), "temp file left after failed write");
    assert!(store.list()?.is_empty());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn overlapping_snapshots_in_one_second_all_succeed() -> Result<()> {
    let root = unique_root("overlap");
    let store: Arc<dyn SnapshotStore> = Arc::new(DirStore::new(&root));
    store.ensure_dir()?;

    let table = Arc::new(DocumentTable::new());
    table.append("k", json!(1));
    let reg = Arc::new(SnapshotRegistry::new());
    let mgr = Arc::new(
        SnapshotManager::new(Arc::clone(&store), Arc::clone(&table), Arc::clone(&reg))
            .with_clock(Arc::new(|| 77)),
    );

    let mut hs = Vec::new();
    for _ in 0..8 {
        let mgr = Arc::clone(&mgr);
        hs.push(std::thread::spawn(move || {
            (0..20).all(|_| mgr.take_snapshot().is_some())
        }));
    }
    for h in hs {
        assert!(h.join().expect("snapshot thread panicked"));
    }

    assert_eq!(mgr.consecutive_failures(), 0);
    assert_eq!(reg.len(), 1);
    assert!(!root.join("77.partial").exists());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
