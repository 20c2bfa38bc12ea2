//! Exclusive directory lock: one serving process per snapshot directory.
//!
//! Cross-platform (fs2) advisory lock on `<snapshot_dir>/LOCK`.
//! Acquisition never blocks: a second process fails fast at startup
//! instead of waiting and then racing the first one on snapshot names.
//! Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::consts::LOCK_FILE;

pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        // ошибки unlock на drop игнорируем
        let _ = self.file.unlock();
    }
}

fn lock_file_path(dir: &Path) -> PathBuf {
    dir.join(LOCK_FILE)
}

/// Try to take the exclusive lock. Returns Err if another process holds it.
pub fn try_lock_dir(dir: &Path) -> Result<DirLock> {
    let path = lock_file_path(dir);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    file.try_lock_exclusive().with_context(|| {
        format!(
            "snapshot directory is in use by another process: {}",
            path.display()
        )
    })?;
    Ok(DirLock { file, path })
}
