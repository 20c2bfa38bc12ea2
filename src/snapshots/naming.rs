//! Snapshot file naming.
//!
//! `<decimal-unix-seconds>.cloudbase`. Any name containing the marker qualifies;
//! its timestamp is the first `.`-separated segment and must parse as an integer.

use anyhow::{anyhow, Result};

use crate::consts::{SNAPSHOT_MARKER, SNAPSHOT_PARTIAL_EXT};

pub fn snapshot_file_name(unix_secs: u64) -> String {
    format!("{}.{}", unix_secs, SNAPSHOT_MARKER)
}

/// Temporary name used while a snapshot is being written.
pub fn partial_file_name(unix_secs: u64) -> String {
    format!("{}.{}", unix_secs, SNAPSHOT_PARTIAL_EXT)
}

pub fn is_snapshot_name(name: &str) -> bool {
    name.contains(SNAPSHOT_MARKER)
}

pub fn is_partial_name(name: &str) -> bool {
    !is_snapshot_name(name)
        && name
            .rsplit_once('.')
            .map(|(_, ext)| ext == SNAPSHOT_PARTIAL_EXT)
            .unwrap_or(false)
}

/// Timestamp embedded in a qualifying name.
pub fn parse_snapshot_ts(name: &str) -> Result<u64> {
    let head = name.split('.').next().unwrap_or("");
    head.parse::<u64>()
        .map_err(|e| anyhow!("cannot convert snapshot name '{}' to time: {}", name, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_parse() {
        let n = snapshot_file_name(1_700_000_000);
        assert_eq!(n, "1700000000.cloudbase");
        assert!(is_snapshot_name(&n));
        assert_eq!(parse_snapshot_ts(&n).unwrap(), 1_700_000_000);
    }

    #[test]
    fn partial_never_qualifies() {
        let p = partial_file_name(42);
        assert_eq!(p, "42.partial");
        assert!(!is_snapshot_name(&p));
        assert!(is_partial_name(&p));
        assert!(!is_partial_name("42.cloudbase"));
        assert!(!is_partial_name("LOCK"));
    }

    #[test]
    fn bad_names_fail_to_parse() {
        assert!(parse_snapshot_ts("abc.cloudbase").is_err());
        assert!(parse_snapshot_ts(".cloudbase").is_err());
        assert!(parse_snapshot_ts("-1.cloudbase").is_err());
        assert!(parse_snapshot_ts("12x.cloudbase").is_err());
    }

    #[test]
    fn numeric_not_lexical_order() {
        let mut v = vec!["99.cloudbase", "100.cloudbase", "9.cloudbase"];
        v.sort_by_key(|n| parse_snapshot_ts(n).unwrap());
        assert_eq!(v, vec!["9.cloudbase", "99.cloudbase", "100.cloudbase"]);
    }
}
