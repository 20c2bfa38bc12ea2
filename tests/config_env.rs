use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use cloudbase::{CloudConfig, RetentionPolicy};

/// Уникальный корневой путь для теста.
fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("cb-{}-{}-{}", prefix, pid, t))
}

// Один тест на файл: env общий для процесса.
#[test]
fn env_overrides_file_overrides_defaults() -> Result<()> {
    let root = unique_root("cfg");
    fs::create_dir_all(&root)?;
    let path = root.join("cloudbase.toml");
    fs::write(
        &path,
        r#"
listen_addr = "127.0.0.1:9000"
snapshot_dir = "/tmp/from-file"
snapshot_interval_ms = 5000
retention_threshold = 10
"#,
    )?;

    std::env::set_var("CLOUDBASE_SNAPSHOT_INTERVAL_MS", "250");
    std::env::set_var("CLOUDBASE_RETENTION_POLICY", "legacy");
    std::env::set_var("CLOUDBASE_FINAL_SNAPSHOT", "0");
    std::env::set_var("CLOUDBASE_METRICS_ADDR", "127.0.0.1:9898");

    let cfg = CloudConfig::from_file(&path)?.apply_env();

    assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
    assert_eq!(cfg.snapshot_dir, PathBuf::from("/tmp/from-file"));
    assert_eq!(cfg.snapshot_interval_ms, 250);
    assert_eq!(cfg.retention_threshold, 10);
    assert_eq!(cfg.retention_policy, RetentionPolicy::Legacy);
    assert!(!cfg.final_snapshot_on_stop);
    assert_eq!(cfg.metrics_addr.as_deref(), Some("127.0.0.1:9898"));
    // не заданное нигде остаётся дефолтом
    assert_eq!(cfg.http_workers, CloudConfig::default().http_workers);
    cfg.validate()?;

    for k in [
        "CLOUDBASE_SNAPSHOT_INTERVAL_MS",
        "CLOUDBASE_RETENTION_POLICY",
        "CLOUDBASE_FINAL_SNAPSHOT",
        "CLOUDBASE_METRICS_ADDR",
    ] {
        std::env::remove_var(k);
    }
    let _ = fs::remove_dir_all(&root);
    Ok(())
}
