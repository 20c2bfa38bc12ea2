//! Retention cleaner: Prune.
//!
//! Runs after every snapshot. Below or at the threshold it does nothing.
//! Above it, the configured `RetentionPolicy` decides:
//!
//! - KeepNewest: delete the oldest tracked files until `threshold` remain.
//!   Files whose deletion failed stay tracked and are retried next cycle.
//! - Legacy: keep index 0, delete index 1.., then forget every path. Index 0
//!   survives on disk untracked. Kept for deployments relying on the old
//!   rotation.
//!
//! Deletions are best-effort: each failure is logged, the rest proceed.

use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RetentionPolicy;
use crate::metrics::record_prune;

use super::registry::SnapshotRegistry;
use super::store::SnapshotStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl PruneReport {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.failed.is_empty()
    }
}

pub struct RetentionCleaner {
    store: Arc<dyn SnapshotStore>,
    registry: Arc<SnapshotRegistry>,
    threshold: usize,
    policy: RetentionPolicy,
}

impl RetentionCleaner {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        registry: Arc<SnapshotRegistry>,
        threshold: usize,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            store,
            registry,
            threshold: threshold.max(1),
            policy,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn prune(&self) -> PruneReport {
        // choose victims under the lock, delete without it
        let victims: Vec<PathBuf> = {
            let mut g = self.registry.lock();
            if g.len() <= self.threshold {
                return PruneReport::default();
            }
            match self.policy {
                RetentionPolicy::KeepNewest => {
                    let excess = g.len() - self.threshold;
                    g[..excess].to_vec()
                }
                RetentionPolicy::Legacy => {
                    let v = g[1..].to_vec();
                    g.clear();
                    v
                }
            }
        };

        let mut report = PruneReport::default();
        for p in victims {
            match self.store.remove(&p) {
                Ok(()) => {
                    debug!("retention: cleaned {}", p.display());
                    report.removed.push(p);
                }
                Err(e) => {
                    warn!("retention: cannot clean {}: {:#}", p.display(), e);
                    report.failed.push(p);
                }
            }
        }

        if self.policy == RetentionPolicy::KeepNewest {
            let mut g = self.registry.lock();
            g.retain(|p| !report.removed.contains(p));
        }

        record_prune(report.removed.len(), report.failed.len());
        info!(
            "retention ({}): removed {} snapshot(s), {} failure(s), tracking {}",
            self.policy,
            report.removed.len(),
            report.failed.len(),
            self.registry.len()
        );
        report
    }
}
