//! Document table: key -> ordered list of JSON values.
//!
//! One mutex guards the whole map. Every operation holds it only for the
//! in-memory work; callers never get a reference into the map, only copies.
//! An absent key reads as an empty list, there is no explicit creation.

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::matcher::entry_matches;
use crate::metrics::{record_append, record_fetch, record_update};

/// Whole-table shape, also the on-disk snapshot shape.
pub type TableMap = BTreeMap<String, Vec<Value>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub keys: usize,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct DocumentTable {
    inner: Mutex<TableMap>,
}

impl DocumentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: TableMap) -> Self {
        Self {
            inner: Mutex::new(map),
        }
    }

    // A panic while holding the lock leaves the map structurally valid
    // (every mutation is a single push/assign), so keep serving it.
    fn guard(&self) -> MutexGuard<'_, TableMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `value` to the list under `key`.
    pub fn append(&self, key: &str, value: Value) {
        {
            let mut g = self.guard();
            g.entry(key.to_string()).or_default().push(value);
        }
        record_append();
        debug!("append: key='{}'", key);
    }

    /// Copy of the list under `key`; empty when the key was never written.
    pub fn fetch_all(&self, key: &str) -> Vec<Value> {
        let out = {
            let g = self.guard();
            g.get(key).cloned().unwrap_or_default()
        };
        record_fetch();
        debug!("fetch: key='{}' entries={}", key, out.len());
        out
    }

    /// Replace, in place, every entry whose `field` matches `target`
    /// (see `matcher`). Returns how many entries were replaced.
    pub fn update_matching(&self, key: &str, field: &str, target: &str, replacement: Value) -> usize {
        let replaced = {
            let mut g = self.guard();
            match g.get_mut(key) {
                Some(list) => {
                    let mut n = 0usize;
                    for entry in list.iter_mut() {
                        if entry_matches(entry, field, target) {
                            *entry = replacement.clone();
                            n += 1;
                        }
                    }
                    n
                }
                None => 0,
            }
        };
        record_update(replaced);
        debug!(
            "update: key='{}' {}={} replaced={}",
            key, field, target, replaced
        );
        replaced
    }

    /// Serialize the whole table under the lock. The bytes are a consistent
    /// point-in-time image; file I/O on them happens after the lock is gone.
    pub fn export_json(&self) -> Result<Vec<u8>> {
        let g = self.guard();
        serde_json::to_vec(&*g).context("serialize document table")
    }

    /// Cloned copy of the whole table.
    pub fn to_map(&self) -> TableMap {
        self.guard().clone()
    }

    /// Install recovered contents, dropping whatever was there.
    pub fn replace_all(&self, map: TableMap) {
        *self.guard() = map;
    }

    pub fn stats(&self) -> TableStats {
        let g = self.guard();
        TableStats {
            keys: g.len(),
            entries: g.values().map(Vec::len).sum(),
        }
    }
}
