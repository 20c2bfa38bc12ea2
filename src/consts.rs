//! Shared constants: snapshot naming, default tunables.

/// Substring that marks a file in the snapshot directory as a snapshot.
/// Full name: `<unix-seconds>.cloudbase`.
pub const SNAPSHOT_MARKER: &str = "cloudbase";

/// Extension of an in-progress snapshot write (`<unix-seconds>.partial`).
/// Never contains the marker, so recovery does not pick it up.
pub const SNAPSHOT_PARTIAL_EXT: &str = "partial";

/// Advisory lock file inside the snapshot directory.
pub const LOCK_FILE: &str = "LOCK";

/// Unix permissions for a freshly created snapshot directory (rwxr-----).
pub const SNAPSHOT_DIR_MODE: u32 = 0o740;

// ----- defaults -----
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:7777";
pub const DEFAULT_SNAPSHOT_DIR: &str = ".cloudbase";
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_RETENTION_THRESHOLD: usize = 60;
pub const DEFAULT_HTTP_WORKERS: usize = 4;
pub const DEFAULT_MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;
pub const DEFAULT_UNHEALTHY_AFTER: u64 = 3;

/// How often `Cloudbase::serve_until` checks its shutdown flag.
pub const SHUTDOWN_POLL_MS: u64 = 100;
