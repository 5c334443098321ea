//! CSV export of duplicate groups.
//!
//! Each grouped file becomes one row, so a group of three copies spans three
//! consecutive rows sharing the same `hash`.

use crate::dupes::DuplicateGroups;
use anyhow::Result;
use csv::Writer;
use humansize::{DECIMAL, format_size};
use serde::Serialize;
use std::io::Write;

/// A single CSV row.
#[derive(Debug, Serialize)]
pub struct CsvRow {
    pub hash: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub class: &'static str,
    pub mime: &'static str,
    /// Number of files sharing this digest
    pub copies: usize,
    pub path: String,
}

/// Renders groups as CSV rows, ordered by digest then arrival.
pub fn render<W: Write>(groups: &DuplicateGroups, include_singletons: bool, writer: W) -> Result<()> {
    let mut csv_writer = Writer::from_writer(writer);

    for group in groups.iter().filter(|g| include_singletons || g.is_duplicate()) {
        let class = group.kind.class.as_str();
        for path in &group.paths {
            csv_writer.serialize(CsvRow {
                hash: group.hash.clone(),
                size_bytes: group.size,
                size_human: format_size(group.size, DECIMAL),
                class,
                mime: group.kind.mime,
                copies: group.paths.len(),
                path: path.display().to_string(),
            })?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}
