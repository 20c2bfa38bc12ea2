//! Snapshot timer: one background thread running TakeSnapshot + Prune at a
//! fixed rate.
//!
//! Ticks are scheduled against absolute deadlines (like a ticker), so a slow
//! cycle does not shift all later ones. If a cycle overruns a whole period,
//! the missed ticks are dropped rather than fired back to back.
//!
//! `stop()` wakes the thread immediately through the channel; when
//! `final_snapshot` is set, one more cycle runs before the thread exits.

use anyhow::{Context, Result};
use log::{debug, info};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::snapshots::{RetentionCleaner, SnapshotManager};

pub struct Scheduler {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

/// One timer cycle: snapshot, then retention.
pub fn run_cycle(manager: &SnapshotManager, cleaner: &RetentionCleaner) {
    manager.take_snapshot();
    cleaner.prune();
}

impl Scheduler {
    pub fn start(
        interval: Duration,
        manager: Arc<SnapshotManager>,
        cleaner: Arc<RetentionCleaner>,
        final_snapshot: bool,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("cloudbase-snapshot".into())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                loop {
                    let wait = next.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            debug!("scheduler: tick");
                            run_cycle(&manager, &cleaner);
                            next += interval;
                            let now = Instant::now();
                            if next <= now {
                                next = now + interval;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                            if final_snapshot {
                                run_cycle(&manager, &cleaner);
                            }
                            break;
                        }
                    }
                }
                debug!("scheduler: stopped");
            })
            .context("spawn snapshot scheduler thread")?;

        info!("scheduler: snapshot every {:?}", interval);
        Ok(Self {
            stop_tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the timer and wait for the thread (including the final cycle).
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
