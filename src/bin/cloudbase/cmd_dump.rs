use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use cloudbase::snapshots::{load_snapshot, scan_snapshots, DirStore};

pub fn exec(dir: PathBuf, key: Option<String>, snapshot: Option<String>) -> Result<()> {
    let store = DirStore::new(dir.clone());
    let name = match snapshot {
        Some(n) => n,
        None => scan_snapshots(&store)
            .with_context(|| format!("list snapshots at {}", dir.display()))?
            .pop()
            .map(|f| f.name)
            .ok_or_else(|| anyhow!("no snapshots in {}", dir.display()))?,
    };

    let table = load_snapshot(&store, &name)?;
    let out = match key {
        Some(k) => serde_json::to_string_pretty(&table.get(&k).cloned().unwrap_or_default())?,
        None => serde_json::to_string_pretty(&table)?,
    };
    println!("{}", out);
    Ok(())
}
