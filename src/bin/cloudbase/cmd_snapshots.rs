use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;

use cloudbase::snapshots::{scan_snapshots, DirStore};

/// Список снапшотов (старые первыми), опционально JSON.
pub fn exec(dir: PathBuf, json: bool) -> Result<()> {
    let store = DirStore::new(dir.clone());
    let files =
        scan_snapshots(&store).with_context(|| format!("list snapshots at {}", dir.display()))?;

    if json {
        let arr: Vec<_> = files
            .iter()
            .map(|f| {
                json!({
                    "ts": f.ts,
                    "name": f.name,
                    "path": f.path.display().to_string(),
                    "bytes": std::fs::metadata(&f.path).map(|m| m.len()).ok(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&arr)?);
        return Ok(());
    }

    if files.is_empty() {
        println!("(no snapshots)");
        return Ok(());
    }
    for f in &files {
        let bytes = std::fs::metadata(&f.path).map(|m| m.len()).unwrap_or(0);
        println!("{:>12}  {:>10} B  {}", f.ts, bytes, f.name);
    }
    println!("total: {}", files.len());
    Ok(())
}
