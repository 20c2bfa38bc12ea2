//! Store runtime: wires config, table, snapshots, scheduler and HTTP.
//!
//! Lifecycle: `Starting -> Recovering -> Serving -> Stopped`.
//! - `open()` runs Starting + Recovering: validates config, prepares and locks
//!   the snapshot directory, loads the newest snapshot. Any failure here is
//!   fatal (`StoreError::StartupIntegrity`).
//! - `start()` enters Serving: snapshot timer, document API, optional exporter.
//! - `stop()` (or Drop) enters Stopped: listeners closed, final snapshot
//!   written when configured. `serve_until` calls it once a shutdown flag
//!   is raised; the binary raises it on SIGINT/SIGTERM.

use anyhow::Result;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::CloudConfig;
use crate::consts::SHUTDOWN_POLL_MS;
use crate::error::StoreError;
use crate::lock::{try_lock_dir, DirLock};
use crate::scheduler::Scheduler;
use crate::server::exporter::{Exporter, ExporterState};
use crate::server::{HttpServer, RequestContext};
use crate::snapshots::{
    recover, Clock, DirStore, RecoveryReport, RetentionCleaner, SnapshotManager,
    SnapshotRegistry, SnapshotStore,
};
use crate::table::DocumentTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Recovering,
    Serving,
    Stopped,
}

pub struct Cloudbase {
    cfg: CloudConfig,
    phase: Phase,
    table: Arc<DocumentTable>,
    registry: Arc<SnapshotRegistry>,
    manager: Arc<SnapshotManager>,
    cleaner: Arc<RetentionCleaner>,
    recovery: RecoveryReport,
    serving: Arc<AtomicBool>,
    scheduler: Option<Scheduler>,
    http: Option<HttpServer>,
    exporter: Option<Exporter>,
    _lock: DirLock,
}

impl Cloudbase {
    /// Starting + Recovering against the configured snapshot directory.
    pub fn open(cfg: CloudConfig) -> Result<Self> {
        let store: Arc<dyn SnapshotStore> = Arc::new(DirStore::new(cfg.snapshot_dir.clone()));
        Self::open_with(cfg, store, None)
    }

    /// Same as `open` with an explicit store and optional clock.
    pub fn open_with(
        cfg: CloudConfig,
        store: Arc<dyn SnapshotStore>,
        clock: Option<Clock>,
    ) -> Result<Self> {
        info!("cloudbase {}: {}", env!("CARGO_PKG_VERSION"), cfg);
        cfg.validate().map_err(StoreError::startup)?;

        store.ensure_dir().map_err(StoreError::startup)?;
        let lock = try_lock_dir(store.dir()).map_err(StoreError::startup)?;

        let phase = Phase::Recovering;
        let table = Arc::new(DocumentTable::new());
        let registry = Arc::new(SnapshotRegistry::new());
        let recovery = recover(store.as_ref(), &table, &registry)?;

        let mut manager = SnapshotManager::new(
            Arc::clone(&store),
            Arc::clone(&table),
            Arc::clone(&registry),
        );
        if let Some(c) = clock {
            manager = manager.with_clock(c);
        }
        let cleaner = RetentionCleaner::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            cfg.retention_threshold,
            cfg.retention_policy,
        );

        Ok(Self {
            cfg,
            phase,
            table,
            registry,
            manager: Arc::new(manager),
            cleaner: Arc::new(cleaner),
            recovery,
            serving: Arc::new(AtomicBool::new(false)),
            scheduler: None,
            http: None,
            exporter: None,
            _lock: lock,
        })
    }

    /// Enter Serving: start the timer and the listeners.
    pub fn start(&mut self) -> Result<()> {
        if self.phase != Phase::Recovering {
            return Err(anyhow::anyhow!("cannot start from phase {:?}", self.phase));
        }

        self.scheduler = Some(Scheduler::start(
            self.cfg.snapshot_interval(),
            Arc::clone(&self.manager),
            Arc::clone(&self.cleaner),
            self.cfg.final_snapshot_on_stop,
        )?);

        let ctx = Arc::new(RequestContext {
            table: Arc::clone(&self.table),
            max_body_bytes: self.cfg.max_body_bytes,
        });
        self.http = Some(HttpServer::bind(&self.cfg.listen_addr, ctx, self.cfg.http_workers)?);

        if let Some(addr) = self.cfg.metrics_addr.clone() {
            let state = ExporterState {
                serving: Arc::clone(&self.serving),
                table: Arc::clone(&self.table),
                registry: Arc::clone(&self.registry),
                manager: Arc::clone(&self.manager),
                unhealthy_after: self.cfg.unhealthy_after_failures,
            };
            self.exporter = Some(Exporter::bind(&addr, state)?);
        }

        self.serving.store(true, Ordering::SeqCst);
        self.phase = Phase::Serving;
        Ok(())
    }

    /// Block until `shutdown` is raised (signal handler, embedding code),
    /// then enter Stopped.
    pub fn serve_until(&mut self, shutdown: &AtomicBool) {
        let tick = Duration::from_millis(SHUTDOWN_POLL_MS);
        while !shutdown.load(Ordering::SeqCst) {
            thread::sleep(tick);
        }
        info!("cloudbase: shutdown requested");
        self.stop();
    }

    /// open + start + serve_until.
    pub fn run_until(cfg: CloudConfig, shutdown: &AtomicBool) -> Result<()> {
        let mut cb = Self::open(cfg)?;
        cb.start()?;
        cb.serve_until(shutdown);
        Ok(())
    }

    /// Enter Stopped. Idempotent.
    pub fn stop(&mut self) {
        if self.phase == Phase::Stopped {
            return;
        }
        self.serving.store(false, Ordering::SeqCst);
        if let Some(mut http) = self.http.take() {
            http.stop();
        }
        if let Some(mut ex) = self.exporter.take() {
            ex.stop();
        }
        if let Some(mut s) = self.scheduler.take() {
            // final snapshot (if configured) happens inside
            s.stop();
        }
        self.phase = Phase::Stopped;
        info!("cloudbase stopped");
    }

    /// One snapshot + retention cycle right now, outside the timer.
    /// Returns the snapshot path, None if the write failed.
    pub fn snapshot_now(&self) -> Option<PathBuf> {
        let p = self.manager.take_snapshot();
        self.cleaner.prune();
        p
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &CloudConfig {
        &self.cfg
    }

    pub fn table(&self) -> &Arc<DocumentTable> {
        &self.table
    }

    pub fn registry(&self) -> &Arc<SnapshotRegistry> {
        &self.registry
    }

    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.http.as_ref().map(HttpServer::local_addr)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.exporter.as_ref().map(Exporter::local_addr)
    }
}

impl Drop for Cloudbase {
    fn drop(&mut self) {
        self.stop();
    }
}
