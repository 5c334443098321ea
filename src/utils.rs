//! Utility functions for `dedup`.
//!
//! This module provides:
//! - Hex encoding of content digests
//! - Epoch-millisecond timestamps and their human-readable form
//! - Path canonicalization for scan roots

use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Lowercase hex encoding of a byte slice.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn epoch_millis_now() -> i64 {
    Utc::now().timestamp_millis()
}

/// Converts epoch milliseconds to a local date-time, if representable.
pub fn millis_to_local(millis: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(millis).single()
}

/// Formats an epoch-millisecond timestamp for log and terminal output.
///
/// A zero timestamp means the directory was never stat'ed and renders as
/// `"never"`.
pub fn format_timestamp(millis: i64) -> String {
    if millis == 0 {
        return "never".to_string();
    }
    match millis_to_local(millis) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S%.3f %:z").to_string(),
        None => format!("{}ms", millis),
    }
}

/// Canonicalizes a scan root, falling back to an absolute join with the
/// current directory when the path does not exist (yet).
pub fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_hex(&[0x00, 0x0f, 0xa0, 0xff]), "000fa0ff");
    }

    #[test]
    fn test_format_timestamp_never() {
        assert_eq!(format_timestamp(0), "never");
        assert_ne!(format_timestamp(epoch_millis_now()), "never");
    }

    #[test]
    fn test_millis_roundtrip() {
        let now = epoch_millis_now();
        let local = millis_to_local(now).unwrap();
        assert_eq!(local.timestamp_millis(), now);
    }

    #[test]
    fn test_absolute_path_canonicalizes() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();

        let dotted = nested.join("..").join("sub");
        assert_eq!(absolute_path(&dotted), nested.canonicalize().unwrap());
    }

    #[test]
    fn test_absolute_path_missing_relative() {
        let resolved = absolute_path(Path::new("does-not-exist-dedup"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("does-not-exist-dedup"));
    }
}
