//! Data structures shared by the scan, hash and report stages.
//!
//! This module defines the entry census types produced by directory listing
//! and the [`MediaFileRecord`] produced by the hashing pool.

use crate::state::Encoding;
use crate::utils::to_hex;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Kind of a direct child of a scanned directory.
///
/// # Variants
/// * `Regular` - A regular file
/// * `Dir` - A directory
/// * `Other` - Symlinks, sockets, fifos, devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    Regular,
    Dir,
    Other,
}

impl EntryKind {
    /// Returns a string representation of the entry kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Regular => "FILE",
            EntryKind::Dir => "DIR",
            EntryKind::Other => "SPECIAL",
        }
    }
}

/// One direct child as reported by a [`crate::lister::DirectoryLister`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    /// File name relative to the scanned directory, exactly as the
    /// filesystem returned it
    pub name: OsString,
    pub kind: EntryKind,
}

impl DirEntryInfo {
    pub fn new(name: impl Into<OsString>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Identity of a scanned directory, shared read-only with every record
/// hashed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanIdentity {
    pub path: PathBuf,
    pub encoding: Encoding,
}

/// Broad media family of a sniffed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    Image,
    Video,
}

impl MediaClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaClass::Image => "image",
            MediaClass::Video => "video",
        }
    }
}

/// A sniffed media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MediaKind {
    pub class: MediaClass,
    /// Canonical extension, e.g. `jpg`
    pub extension: &'static str,
    pub mime: &'static str,
}

impl MediaKind {
    pub const fn image(extension: &'static str, mime: &'static str) -> Self {
        Self {
            class: MediaClass::Image,
            extension,
            mime,
        }
    }

    pub const fn video(extension: &'static str, mime: &'static str) -> Self {
        Self {
            class: MediaClass::Video,
            extension,
            mime,
        }
    }
}

/// SHA-256 digest
pub type ContentHash = [u8; 32];

/// A media file that was sniffed and fully hashed.
///
/// Records are built once by a hashing worker and moved to the consumer of
/// the results channel.
#[derive(Debug, Clone)]
pub struct MediaFileRecord {
    scan: Arc<ScanIdentity>,
    path: PathBuf,
    kind: MediaKind,
    hash: ContentHash,
    size: u64,
}

impl MediaFileRecord {
    pub fn new(
        scan: Arc<ScanIdentity>,
        name: impl AsRef<Path>,
        kind: MediaKind,
        hash: ContentHash,
        size: u64,
    ) -> Self {
        let path = scan.path.join(name);
        Self {
            scan,
            path,
            kind,
            hash,
            size,
        }
    }

    /// The scan this record was produced by
    pub fn scan(&self) -> &ScanIdentity {
        &self.scan
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Lowercase hex encoding of the content hash
    pub fn hex_digest(&self) -> String {
        to_hex(&self.hash)
    }

    /// Number of bytes that went through the hasher
    pub fn size(&self) -> u64 {
        self.size
    }
}
