use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use cloudbase::{CloudConfig, Cloudbase};

use super::cli::ServeArgs;
use super::signal::install_shutdown_handlers;

/// Build the effective config and serve until SIGINT/SIGTERM.
pub fn exec(args: ServeArgs) -> Result<()> {
    let cfg = effective_config(args)?;
    let shutdown = Arc::new(AtomicBool::new(false));
    install_shutdown_handlers(Arc::clone(&shutdown))?;
    Cloudbase::run_until(cfg, &shutdown)
}

fn effective_config(args: ServeArgs) -> Result<CloudConfig> {
    let base = match &args.config {
        Some(p) => CloudConfig::from_file(p)?,
        None => CloudConfig::default(),
    };
    let mut cfg = base.apply_env();

    if let Some(v) = args.listen {
        cfg = cfg.with_listen_addr(v);
    }
    if let Some(v) = args.dir {
        cfg = cfg.with_snapshot_dir(v);
    }
    if let Some(v) = args.interval_ms {
        cfg = cfg.with_snapshot_interval_ms(v);
    }
    if let Some(v) = args.retention {
        cfg = cfg.with_retention_threshold(v);
    }
    if let Some(v) = args.retention_policy {
        cfg = cfg.with_retention_policy(v);
    }
    if let Some(v) = args.workers {
        cfg = cfg.with_http_workers(v);
    }
    if let Some(v) = args.max_body_bytes {
        cfg = cfg.with_max_body_bytes(v);
    }
    if args.metrics_addr.is_some() {
        cfg = cfg.with_metrics_addr(args.metrics_addr);
    }
    if args.no_final_snapshot {
        cfg = cfg.with_final_snapshot_on_stop(false);
    }
    Ok(cfg)
}
