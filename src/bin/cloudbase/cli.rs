use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use cloudbase::RetentionPolicy;

/// cloudbase: JSON document store over HTTP with periodic snapshots
#[derive(Parser, Debug)]
#[command(name = "cloudbase", version, about = "cloudbase document store")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Recover from the snapshot directory and serve the document API
    ///
    /// Priority: flags > CLOUDBASE_* env > --config file > defaults.
    ///
    /// Примеры:
    ///   cloudbase serve
    ///   cloudbase serve --listen 127.0.0.1:7777 --interval-ms 5000 --retention 120
    ///   cloudbase serve --config ./cloudbase.toml --metrics-addr 127.0.0.1:9898
    Serve(ServeArgs),

    /// List snapshot files, oldest first
    Snapshots {
        #[arg(long, default_value = ".cloudbase")]
        dir: PathBuf,
        /// JSON output (array)
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the contents of a snapshot (the newest by default)
    Dump {
        #[arg(long, default_value = ".cloudbase")]
        dir: PathBuf,
        /// Only this key's entries
        #[arg(long)]
        key: Option<String>,
        /// Snapshot file name, e.g. 1700000000.cloudbase
        #[arg(long)]
        snapshot: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Listen address of the document API
    #[arg(long)]
    pub listen: Option<String>,

    /// Snapshot directory
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Snapshot period in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Tracked snapshots allowed before pruning
    #[arg(long)]
    pub retention: Option<usize>,

    /// keep-newest|legacy
    #[arg(long)]
    pub retention_policy: Option<RetentionPolicy>,

    /// HTTP worker threads
    #[arg(long)]
    pub workers: Option<usize>,

    /// Max request body size in bytes
    #[arg(long)]
    pub max_body_bytes: Option<u64>,

    /// Health/metrics listen address (disabled if not set)
    #[arg(long)]
    pub metrics_addr: Option<String>,

    /// Do not write a snapshot on shutdown
    #[arg(long, default_value_t = false)]
    pub no_final_snapshot: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Cli as Parser>::parse()
    }
}
