//! Snapshots module split into submodules:
//! - naming.rs: `<unix-seconds>.cloudbase` names (format/parse/qualify).
//! - store.rs: SnapshotStore trait + DirStore (directory on disk, atomic writes).
//! - registry.rs: SnapshotRegistry (paths tracked for retention accounting).
//! - manager.rs: SnapshotManager (TakeSnapshot).
//! - retention.rs: RetentionCleaner (Prune).
//! - recovery.rs: startup scan + load of the newest snapshot.

pub mod naming;
pub mod store;

mod manager;
mod recovery;
mod registry;
mod retention;

pub use manager::{Clock, SnapshotManager};
pub use recovery::{load_snapshot, recover, scan_snapshots, RecoveryReport, SnapshotFile};
pub use registry::SnapshotRegistry;
pub use retention::{PruneReport, RetentionCleaner};
pub use store::{DirStore, SnapshotStore};
