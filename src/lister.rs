//! Directory entry listing.
//!
//! The scan state only needs the direct children of one directory with a
//! kind tag. [`FsLister`] provides that from the live filesystem through
//! `walkdir`; tests and embedders can substitute any [`DirectoryLister`].

use crate::data::{DirEntryInfo, EntryKind};
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Lists the direct children of a directory.
pub trait DirectoryLister: Send + Sync {
    /// Returns the children of `dir` in listing order.
    ///
    /// # Errors
    /// Returns an error if `dir` cannot be opened or read.
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>>;
}

/// Lists one directory level from the filesystem.
///
/// Symlinks are not followed and are reported as [`EntryKind::Other`].
/// Entries are returned sorted by file name so that enumeration order is
/// stable across runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl DirectoryLister for FsLister {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        if !std::fs::metadata(dir)?.is_dir() {
            return Err(io::Error::other(format!("{} is not a directory", dir.display())));
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let fallback = e.to_string();
                e.into_io_error().unwrap_or_else(|| io::Error::other(fallback))
            })?;

            let file_type = entry.file_type();
            let kind = if file_type.is_file() {
                EntryKind::Regular
            } else if file_type.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::Other
            };

            entries.push(DirEntryInfo::new(entry.file_name().to_os_string(), kind));
        }

        Ok(entries)
    }
}
