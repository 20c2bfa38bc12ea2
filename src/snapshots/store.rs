//! Snapshot storage: the only place that touches the snapshot directory.
//!
//! `SnapshotStore` is the seam between snapshot logic and the filesystem;
//! `DirStore` is the real implementation. Writes go through
//! `<ts>.partial` + fsync + rename, so a crash mid-write never leaves a
//! truncated `*.cloudbase` file behind. A write that fails removes its
//! `<ts>.partial` right away.

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::naming::{parse_snapshot_ts, partial_file_name};

pub trait SnapshotStore: Send + Sync {
    /// Directory the store works in.
    fn dir(&self) -> &Path;

    /// Create the directory if missing. Ok(true) when it was created.
    fn ensure_dir(&self) -> Result<bool>;

    /// Names of regular files in the directory (any order).
    fn list(&self) -> Result<Vec<String>>;

    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Write `bytes` as `name`, replacing an existing file. Returns its path.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Remove a file previously returned by `write` or `path_of`.
    /// A file that is already gone counts as removed.
    fn remove(&self, path: &Path) -> Result<()>;

    fn path_of(&self, name: &str) -> PathBuf {
        self.dir().join(name)
    }
}

#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

#[cfg(unix)]
fn create_dir_restricted(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(crate::consts::SNAPSHOT_DIR_MODE)
        .create(dir)
}

#[cfg(not(unix))]
fn create_dir_restricted(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

fn write_tmp_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(tmp)
        .with_context(|| format!("open {}", tmp.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("write {}", tmp.display()))?;
    f.sync_all()
        .with_context(|| format!("fsync {}", tmp.display()))?;
    drop(f);

    fs::rename(tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))
}

impl SnapshotStore for DirStore {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<bool> {
        match fs::metadata(&self.dir) {
            Ok(m) if m.is_dir() => Ok(false),
            Ok(_) => Err(anyhow!(
                "snapshot path {} exists and is not a directory",
                self.dir.display()
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                create_dir_restricted(&self.dir)
                    .with_context(|| format!("create snapshot dir {}", self.dir.display()))?;
                Ok(true)
            }
            Err(e) => Err(e).with_context(|| format!("stat {}", self.dir.display())),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let rd = fs::read_dir(&self.dir)
            .with_context(|| format!("read dir {}", self.dir.display()))?;
        let mut out = Vec::new();
        for ent in rd {
            let ent = ent.with_context(|| format!("read dir entry in {}", self.dir.display()))?;
            if !ent.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            match ent.file_name().into_string() {
                Ok(name) => out.push(name),
                Err(raw) => debug!("snapshot store: skip non UTF-8 name {:?}", raw),
            }
        }
        Ok(out)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let p = self.path_of(name);
        fs::read(&p).with_context(|| format!("read {}", p.display()))
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_of(name);
        // temp name derives from the timestamp and never carries the marker
        let tmp_name = match parse_snapshot_ts(name) {
            Ok(ts) => partial_file_name(ts),
            Err(_) => format!("{}.tmp", name),
        };
        let tmp = self.path_of(&tmp_name);

        let res = write_tmp_then_rename(&tmp, &path, bytes);
        if res.is_err() {
            match fs::remove_file(&tmp) {
                Ok(()) => debug!("snapshot store: dropped {}", tmp.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("snapshot store: cannot drop {}: {}", tmp.display(), e),
            }
        }
        res.map(|()| path)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("snapshot store: {} already gone", path.display());
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}
