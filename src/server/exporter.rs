//! Health and metrics exporter (Prometheus text), on its own listener.
//!
//! - GET /health  -> 200 "OK" while the process answers.
//! - GET /ready   -> 200 when serving and persistence is healthy, else 503.
//! - GET /metrics -> counters from `metrics` plus table/registry gauges.

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Response, Server};

use crate::metrics;
use crate::snapshots::{SnapshotManager, SnapshotRegistry};
use crate::table::DocumentTable;

#[derive(Clone)]
pub struct ExporterState {
    pub serving: Arc<AtomicBool>,
    pub table: Arc<DocumentTable>,
    pub registry: Arc<SnapshotRegistry>,
    pub manager: Arc<SnapshotManager>,
    pub unhealthy_after: u64,
}

impl ExporterState {
    pub fn is_ready(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
            && self.manager.persistence_healthy(self.unhealthy_after)
    }
}

pub struct Exporter {
    server: Arc<Server>,
    addr: SocketAddr,
    stopping: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Exporter {
    pub fn bind(addr: &str, state: ExporterState) -> Result<Self> {
        let server =
            Server::http(addr).map_err(|e| anyhow!("bind metrics http at {}: {}", addr, e))?;
        let local = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow!("metrics listener at {} is not an IP socket", addr))?;
        let server = Arc::new(server);
        let stopping = Arc::new(AtomicBool::new(false));

        let srv = Arc::clone(&server);
        let stop = Arc::clone(&stopping);
        let handle = thread::Builder::new()
            .name("cloudbase-metrics".into())
            .spawn(move || serve_loop(&srv, &state, &stop))
            .context("spawn metrics thread")?;

        info!("metrics exporter listening on {}", local);
        Ok(Self {
            server,
            addr: local,
            stopping,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(&mut self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        self.server.unblock();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve_loop(server: &Server, state: &ExporterState, stopping: &AtomicBool) {
    loop {
        let rq = match server.recv() {
            Ok(rq) => rq,
            Err(e) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                warn!("metrics recv error: {}", e);
                continue;
            }
        };

        let url = rq.url().to_string();
        let is_get = rq.method().as_str() == "GET";

        let resp = if is_get && (url == "/" || url == "/health") {
            Response::from_string("OK\n").with_status_code(200)
        } else if is_get && url == "/ready" {
            if state.is_ready() {
                Response::from_string("OK\n").with_status_code(200)
            } else {
                Response::from_string("not ready\n").with_status_code(503)
            }
        } else if is_get && url == "/metrics" {
            let mut resp = Response::from_string(build_metrics(state));
            if let Ok(ct) = Header::from_bytes(&b"Content-Type"[..], &b"text/plain; version=0.0.4"[..]) {
                resp.add_header(ct);
            }
            resp
        } else {
            Response::from_string("not found\n").with_status_code(404)
        };

        if let Err(e) = rq.respond(resp) {
            debug!("metrics respond {}: {}", url, e);
        }
    }
}

fn metric(out: &mut String, name: &str, kind: &str, help: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("# HELP {} {}\n", name, help));
    out.push_str(&format!("# TYPE {} {}\n", name, kind));
    out.push_str(&format!("{} {}\n", name, value));
}

pub fn build_metrics(state: &ExporterState) -> String {
    let m = metrics::snapshot();
    let mut out = String::new();

    let ver = env!("CARGO_PKG_VERSION");
    out.push_str("# HELP cloudbase_build_info Build info.\n");
    out.push_str("# TYPE cloudbase_build_info gauge\n");
    out.push_str(&format!("cloudbase_build_info{{version=\"{}\"}} 1\n", ver));

    // --- Document API ---
    metric(&mut out, "cloudbase_appends_total", "counter", "Append operations.", m.appends_total);
    metric(&mut out, "cloudbase_fetches_total", "counter", "FetchAll operations.", m.fetches_total);
    metric(&mut out, "cloudbase_updates_total", "counter", "UpdateMatching operations.", m.updates_total);
    metric(&mut out, "cloudbase_entries_replaced_total", "counter", "Entries replaced by UpdateMatching.", m.entries_replaced);
    metric(&mut out, "cloudbase_bad_requests_total", "counter", "Requests rejected with 400.", m.bad_requests);

    let st = state.table.stats();
    metric(&mut out, "cloudbase_keys", "gauge", "Keys in the document table.", st.keys);
    metric(&mut out, "cloudbase_entries", "gauge", "Entries across all keys.", st.entries);

    // --- Snapshots ---
    metric(&mut out, "cloudbase_snapshots_written_total", "counter", "Snapshots written.", m.snapshots_written);
    metric(&mut out, "cloudbase_snapshot_bytes_written_total", "counter", "Snapshot bytes written.", m.snapshot_bytes_written);
    metric(&mut out, "cloudbase_snapshot_bytes_avg", "gauge", "Average snapshot size (bytes).", format!("{:.2}", m.avg_snapshot_bytes()));
    metric(&mut out, "cloudbase_snapshot_failures_total", "counter", "Failed snapshot attempts.", m.snapshot_failures);
    metric(&mut out, "cloudbase_snapshot_consecutive_failures", "gauge", "Failed snapshot attempts since the last success.", state.manager.consecutive_failures());
    metric(&mut out, "cloudbase_last_snapshot_unix", "gauge", "Timestamp of the last written snapshot.", m.last_snapshot_unix);
    metric(&mut out, "cloudbase_snapshots_tracked", "gauge", "Snapshots tracked for retention.", state.registry.len());

    // --- Retention ---
    metric(&mut out, "cloudbase_prune_runs_total", "counter", "Retention prune runs that deleted something.", m.prune_runs);
    metric(&mut out, "cloudbase_snapshots_removed_total", "counter", "Snapshot files removed by retention.", m.snapshots_removed);
    metric(&mut out, "cloudbase_snapshot_remove_failures_total", "counter", "Snapshot removals that failed.", m.snapshot_remove_failures);

    // --- Recovery / readiness ---
    metric(&mut out, "cloudbase_recovered_entries", "gauge", "Entries loaded at startup.", m.recovered_entries);
    metric(&mut out, "cloudbase_ready", "gauge", "1 when serving with healthy persistence.", u8::from(state.is_ready()));

    out
}
