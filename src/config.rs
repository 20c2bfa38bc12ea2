//! Centralized configuration for cloudbase.
//!
//! Layers, later wins:
//! 1. `CloudConfig::default()`
//! 2. TOML file (`CloudConfig::from_file` / `apply_file`)
//! 3. Environment (`apply_env`, `CLOUDBASE_*`)
//! 4. CLI flags (applied by the binary through the `with_*` setters)
//!
//! The struct is built once at startup and handed to each component; nothing
//! reads configuration from globals afterwards.

use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::consts::{
    DEFAULT_HTTP_WORKERS, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_RETENTION_THRESHOLD, DEFAULT_SNAPSHOT_DIR, DEFAULT_SNAPSHOT_INTERVAL_MS,
    DEFAULT_UNHEALTHY_AFTER,
};

/// What the retention cleaner does once the registry exceeds the threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Delete the oldest tracked snapshots until `threshold` remain.
    KeepNewest,
    /// Keep the first tracked snapshot, delete the rest, forget all of them.
    Legacy,
}

impl FromStr for RetentionPolicy {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep-newest" | "keep_newest" | "newest" | "" => Ok(RetentionPolicy::KeepNewest),
            "legacy" => Ok(RetentionPolicy::Legacy),
            other => Err(anyhow!(
                "invalid retention policy '{}': use keep-newest|legacy",
                other
            )),
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionPolicy::KeepNewest => f.write_str("keep-newest"),
            RetentionPolicy::Legacy => f.write_str("legacy"),
        }
    }
}

/// Top-level configuration of a cloudbase process.
#[derive(Clone, Debug)]
pub struct CloudConfig {
    /// Address of the document API.
    /// Env: CLOUDBASE_LISTEN (default 0.0.0.0:7777)
    pub listen_addr: String,

    /// Directory holding `<unix-seconds>.cloudbase` files.
    /// Env: CLOUDBASE_SNAPSHOT_DIR (default .cloudbase, relative to cwd)
    pub snapshot_dir: PathBuf,

    /// Period of the snapshot timer in milliseconds.
    /// Env: CLOUDBASE_SNAPSHOT_INTERVAL_MS (default 1000)
    pub snapshot_interval_ms: u64,

    /// Tracked snapshots allowed before pruning kicks in.
    /// Env: CLOUDBASE_RETENTION (default 60)
    pub retention_threshold: usize,

    /// Env: CLOUDBASE_RETENTION_POLICY = keep-newest|legacy (default keep-newest)
    pub retention_policy: RetentionPolicy,

    /// Threads pulling requests off the listener.
    /// Env: CLOUDBASE_HTTP_WORKERS (default 4)
    pub http_workers: usize,

    /// Larger request bodies are rejected with 413.
    /// Env: CLOUDBASE_MAX_BODY_BYTES (default 8 MiB)
    pub max_body_bytes: u64,

    /// Optional health/metrics listener. None disables it.
    /// Env: CLOUDBASE_METRICS_ADDR
    pub metrics_addr: Option<String>,

    /// Write one last snapshot when the store is stopped.
    /// Env: CLOUDBASE_FINAL_SNAPSHOT = 0|1 (default 1)
    pub final_snapshot_on_stop: bool,

    /// `/ready` turns 503 after this many consecutive failed snapshots.
    /// Env: CLOUDBASE_UNHEALTHY_AFTER (default 3)
    pub unhealthy_after_failures: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            snapshot_interval_ms: DEFAULT_SNAPSHOT_INTERVAL_MS,
            retention_threshold: DEFAULT_RETENTION_THRESHOLD,
            retention_policy: RetentionPolicy::KeepNewest,
            http_workers: DEFAULT_HTTP_WORKERS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            metrics_addr: None,
            final_snapshot_on_stop: true,
            unhealthy_after_failures: DEFAULT_UNHEALTHY_AFTER,
        }
    }
}

fn env_bool(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let v = std::env::var(name).ok()?;
    match v.trim().parse::<T>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("config: ignoring unparsable {}={:?}", name, v);
            None
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// On-disk TOML shape. Every field optional; absent fields keep the lower layer.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub listen_addr: Option<String>,
    pub snapshot_dir: Option<PathBuf>,
    pub snapshot_interval_ms: Option<u64>,
    pub retention_threshold: Option<usize>,
    pub retention_policy: Option<String>,
    pub http_workers: Option<usize>,
    pub max_body_bytes: Option<u64>,
    pub metrics_addr: Option<String>,
    pub final_snapshot_on_stop: Option<bool>,
    pub unhealthy_after_failures: Option<u64>,
}

impl CloudConfig {
    /// Defaults overlaid with the environment.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Defaults overlaid with a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::default().apply_file(path)
    }

    pub fn apply_env(mut self) -> Self {
        if let Some(s) = env_string("CLOUDBASE_LISTEN") {
            self.listen_addr = s;
        }
        if let Some(s) = env_string("CLOUDBASE_SNAPSHOT_DIR") {
            self.snapshot_dir = PathBuf::from(s);
        }
        if let Some(n) = env_parse::<u64>("CLOUDBASE_SNAPSHOT_INTERVAL_MS") {
            self.snapshot_interval_ms = n;
        }
        if let Some(n) = env_parse::<usize>("CLOUDBASE_RETENTION") {
            self.retention_threshold = n;
        }
        if let Some(p) = env_parse::<RetentionPolicy>("CLOUDBASE_RETENTION_POLICY") {
            self.retention_policy = p;
        }
        if let Some(n) = env_parse::<usize>("CLOUDBASE_HTTP_WORKERS") {
            self.http_workers = n;
        }
        if let Some(n) = env_parse::<u64>("CLOUDBASE_MAX_BODY_BYTES") {
            self.max_body_bytes = n;
        }
        if let Some(s) = env_string("CLOUDBASE_METRICS_ADDR") {
            self.metrics_addr = Some(s);
        }
        if let Ok(v) = std::env::var("CLOUDBASE_FINAL_SNAPSHOT") {
            self.final_snapshot_on_stop = env_bool(&v);
        }
        if let Some(n) = env_parse::<u64>("CLOUDBASE_UNHEALTHY_AFTER") {
            self.unhealthy_after_failures = n;
        }
        self
    }

    pub fn apply_file(self, path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let parsed: FileConfig = toml::from_str(&s)
            .with_context(|| format!("parse TOML config {}", path.display()))?;
        self.apply_file_config(parsed)
    }

    pub fn apply_file_config(mut self, fc: FileConfig) -> Result<Self> {
        if let Some(v) = fc.listen_addr {
            self.listen_addr = v;
        }
        if let Some(v) = fc.snapshot_dir {
            self.snapshot_dir = v;
        }
        if let Some(v) = fc.snapshot_interval_ms {
            self.snapshot_interval_ms = v;
        }
        if let Some(v) = fc.retention_threshold {
            self.retention_threshold = v;
        }
        if let Some(v) = fc.retention_policy {
            self.retention_policy = v.parse()?;
        }
        if let Some(v) = fc.http_workers {
            self.http_workers = v;
        }
        if let Some(v) = fc.max_body_bytes {
            self.max_body_bytes = v;
        }
        if fc.metrics_addr.is_some() {
            self.metrics_addr = fc.metrics_addr;
        }
        if let Some(v) = fc.final_snapshot_on_stop {
            self.final_snapshot_on_stop = v;
        }
        if let Some(v) = fc.unhealthy_after_failures {
            self.unhealthy_after_failures = v;
        }
        Ok(self)
    }

    /// Reject values that would make the store misbehave silently.
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(anyhow!("listen_addr must not be empty"));
        }
        if self.snapshot_dir.as_os_str().is_empty() {
            return Err(anyhow!("snapshot_dir must not be empty"));
        }
        if self.snapshot_interval_ms == 0 {
            return Err(anyhow!("snapshot_interval_ms must be > 0"));
        }
        if self.retention_threshold == 0 {
            return Err(anyhow!("retention_threshold must be > 0"));
        }
        if self.http_workers == 0 {
            return Err(anyhow!("http_workers must be > 0"));
        }
        Ok(())
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    // ----- fluent setters -----

    pub fn with_listen_addr<S: Into<String>>(mut self, addr: S) -> Self {
        self.listen_addr = addr.into();
        self
    }

    pub fn with_snapshot_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    pub fn with_snapshot_interval_ms(mut self, ms: u64) -> Self {
        self.snapshot_interval_ms = ms;
        self
    }

    pub fn with_retention_threshold(mut self, n: usize) -> Self {
        self.retention_threshold = n;
        self
    }

    pub fn with_retention_policy(mut self, p: RetentionPolicy) -> Self {
        self.retention_policy = p;
        self
    }

    pub fn with_http_workers(mut self, n: usize) -> Self {
        self.http_workers = n;
        self
    }

    pub fn with_max_body_bytes(mut self, n: u64) -> Self {
        self.max_body_bytes = n;
        self
    }

    pub fn with_metrics_addr<S: Into<String>>(mut self, addr: Option<S>) -> Self {
        self.metrics_addr = addr.map(Into::into);
        self
    }

    pub fn with_final_snapshot_on_stop(mut self, on: bool) -> Self {
        self.final_snapshot_on_stop = on;
        self
    }

    pub fn with_unhealthy_after_failures(mut self, n: u64) -> Self {
        self.unhealthy_after_failures = n;
        self
    }
}

impl fmt::Display for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CloudConfig {{ \
             listen_addr: {}, \
             snapshot_dir: {}, \
             snapshot_interval_ms: {}, \
             retention_threshold: {}, \
             retention_policy: {}, \
             http_workers: {}, \
             max_body_bytes: {}, \
             metrics_addr: {}, \
             final_snapshot_on_stop: {}, \
             unhealthy_after_failures: {} \
             }}",
            self.listen_addr,
            self.snapshot_dir.display(),
            self.snapshot_interval_ms,
            self.retention_threshold,
            self.retention_policy,
            self.http_workers,
            self.max_body_bytes,
            self.metrics_addr.as_deref().unwrap_or("disabled"),
            self.final_snapshot_on_stop,
            self.unhealthy_after_failures,
        )
    }
}
