//! Grouping of hashed media files by content digest.

use crate::data::{ContentHash, MediaFileRecord, MediaKind};
use crate::utils::to_hex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// All files that share one content digest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    /// Lowercase hex SHA-256 of the content
    pub hash: String,
    /// Size in bytes of every member
    pub size: u64,
    /// Kind sniffed from the first member
    pub kind: MediaKind,
    /// Member paths in arrival order
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    pub fn is_duplicate(&self) -> bool {
        self.paths.len() >= 2
    }

    /// Bytes that could be reclaimed by keeping a single copy
    pub fn wasted_bytes(&self) -> u64 {
        self.size * self.paths.len().saturating_sub(1) as u64
    }
}

/// Digest-keyed groups, ordered by digest.
///
/// Every hashed file belongs to exactly one group, including files with no
/// duplicate; use [`DuplicateGroups::duplicates`] to hide singletons.
#[derive(Debug, Clone, Default)]
pub struct DuplicateGroups {
    groups: BTreeMap<ContentHash, DuplicateGroup>,
    files: usize,
}

impl DuplicateGroups {
    pub fn get(&self, hash: &ContentHash) -> Option<&DuplicateGroup> {
        self.groups.get(hash)
    }

    /// Number of distinct digests
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of files folded in
    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn iter(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values()
    }

    /// Groups with at least two members
    pub fn duplicates(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values().filter(|g| g.is_duplicate())
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates().count()
    }

    pub fn wasted_bytes(&self) -> u64 {
        self.duplicates().map(DuplicateGroup::wasted_bytes).sum()
    }

    /// Hex digest to member paths, the shape of the JSON export.
    pub fn to_path_map(&self, include_singletons: bool) -> BTreeMap<String, Vec<PathBuf>> {
        self.groups
            .values()
            .filter(|g| include_singletons || g.is_duplicate())
            .map(|g| (g.hash.clone(), g.paths.clone()))
            .collect()
    }
}

/// Folds records into [`DuplicateGroups`] as they arrive.
#[derive(Debug, Default)]
pub struct DuplicateAggregator {
    groups: DuplicateGroups,
}

impl DuplicateAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, record: MediaFileRecord) {
        self.groups.files += 1;
        let path = record.path().to_path_buf();
        self.groups
            .groups
            .entry(*record.hash())
            .or_insert_with(|| DuplicateGroup {
                hash: to_hex(record.hash()),
                size: record.size(),
                kind: record.kind(),
                paths: Vec::new(),
            })
            .paths
            .push(path);
    }

    pub fn groups(&self) -> &DuplicateGroups {
        &self.groups
    }

    pub fn into_groups(self) -> DuplicateGroups {
        self.groups
    }
}

impl Extend<MediaFileRecord> for DuplicateAggregator {
    fn extend<I: IntoIterator<Item = MediaFileRecord>>(&mut self, iter: I) {
        for record in iter {
            self.fold(record);
        }
    }
}
