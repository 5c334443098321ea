//! Output formatters for duplicate reports.
//!
//! # Available Formatters
//!
//! - **Terminal**: Human-readable summary with group listings
//! - **JSON**: Digest to paths map for scripting
//! - **CSV**: One row per grouped file for spreadsheet analysis
//!
//! Formatters receive already-built [`crate::dupes::DuplicateGroups`] and
//! contain no grouping logic of their own.

pub mod csv;
pub mod json;
pub mod terminal;

use crate::config::ExportFormat;
use crate::dupes::DuplicateGroups;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub use csv::render as render_csv;
pub use json::render as render_json;
pub use terminal::render as render_terminal;

/// Writes `groups` in `format` to `output`, or to stdout when `None`.
pub fn export(
    groups: &DuplicateGroups,
    format: ExportFormat,
    include_singletons: bool,
    output: Option<&Path>,
) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        ExportFormat::Json => render_json(groups, include_singletons, writer)?,
        ExportFormat::Csv => render_csv(groups, include_singletons, writer)?,
    }

    if let Some(path) = output {
        eprintln!("Duplicate report written to: {}", path.display());
    }
    Ok(())
}
