//! Terminal output for index, dryrun and status results.
//!
//! Renderers write to any `io::Write` so they can be captured in tests;
//! `main` passes stdout.

use crate::run::{DryrunReport, IndexReport};
use crate::state::{Census, ScanSnapshot};
use crate::utils::format_timestamp;
use anyhow::Result;
use humansize::{DECIMAL, format_size};
use std::io::Write;

fn render_census<W: Write>(out: &mut W, census: &Census) -> Result<()> {
    writeln!(
        out,
        "Entries:          {} ({} files, {} dirs, {} special)",
        census.entry_count, census.file_count, census.dir_count, census.special_count
    )?;
    Ok(())
}

/// Renders an index report.
///
/// Only groups with two or more members are listed unless `all_groups` is
/// set. Paths are shown relative to the scanned directory.
pub fn render<W: Write>(report: &IndexReport, all_groups: bool, mut out: W) -> Result<()> {
    writeln!(out, "Directory:        {}", report.path.display())?;
    let previous = report
        .previous
        .as_ref()
        .map(|s| format_timestamp(s.timestamp))
        .unwrap_or_else(|| "never".to_string());
    writeln!(out, "Previous scan:    {}", previous)?;
    render_census(&mut out, &report.census)?;
    writeln!(
        out,
        "Files:            {} hashed, {} skipped, {} failed",
        report.hashed(),
        report.skipped,
        report.failures.len()
    )?;

    let groups = &report.groups;
    writeln!(
        out,
        "Duplicates:       {} group(s), {} reclaimable",
        groups.duplicate_count(),
        format_size(groups.wasted_bytes(), DECIMAL)
    )?;
    writeln!(out)?;

    for group in groups.iter().filter(|g| all_groups || g.is_duplicate()) {
        writeln!(
            out,
            "[{}] {:<12} x{}  {}",
            group.kind.extension.to_uppercase(),
            format_size(group.size, DECIMAL),
            group.paths.len(),
            &group.hash[..16]
        )?;
        for path in &group.paths {
            let shown = path.strip_prefix(&report.path).unwrap_or(path);
            writeln!(out, "    {}", shown.display())?;
        }
    }

    for failure in &report.failures {
        writeln!(out, "[ERROR] {}", failure)?;
    }
    if report.cancelled {
        writeln!(out, "[WARN] run was cancelled, results are partial")?;
    }
    if let Some(err) = &report.persist_error {
        writeln!(out, "[WARN] scan state not saved: {}", err)?;
    }

    out.flush()?;
    Ok(())
}

pub fn render_dryrun<W: Write>(report: &DryrunReport, mut out: W) -> Result<()> {
    writeln!(out, "Directory:        {}", report.path.display())?;
    render_census(&mut out, &report.census)?;
    writeln!(out, "Recorded at:      {}", format_timestamp(report.timestamp))?;
    Ok(())
}

pub fn render_status<W: Write>(snapshot: &ScanSnapshot, mut out: W) -> Result<()> {
    writeln!(out, "Directory:        {}", snapshot.path.display())?;
    render_census(&mut out, &snapshot.census)?;
    writeln!(out, "Last scanned:     {}", format_timestamp(snapshot.timestamp))?;
    writeln!(out, "Written by:       dedup {}", snapshot.dedup_version)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MediaFileRecord, MediaKind, ScanIdentity};
    use crate::dupes::DuplicateAggregator;
    use crate::metrics::ProfileData;
    use crate::progress::ProgressTracker;
    use crate::state::Encoding;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn report() -> IndexReport {
        let scan = Arc::new(ScanIdentity {
            path: PathBuf::from("/photos"),
            encoding: Encoding::Json,
        });
        let kind = MediaKind::image("jpg", "image/jpeg");
        let mut agg = DuplicateAggregator::new();
        agg.fold(MediaFileRecord::new(scan.clone(), "a.jpg", kind, [3; 32], 1500));
        agg.fold(MediaFileRecord::new(scan.clone(), "b.jpg", kind, [3; 32], 1500));
        agg.fold(MediaFileRecord::new(scan, "solo.jpg", kind, [4; 32], 10));

        let tracker = ProgressTracker::new(3);
        tracker.mark_done();
        IndexReport {
            path: PathBuf::from("/photos"),
            previous: None,
            census: Census {
                entry_count: 3,
                file_count: 3,
                dir_count: 0,
                special_count: 0,
            },
            groups: agg.into_groups(),
            skipped: 0,
            failures: Vec::new(),
            progress: tracker.snapshot(),
            cancelled: false,
            persist_error: None,
            profile: ProfileData::new(),
        }
    }

    #[test]
    fn test_render_lists_duplicates_only() {
        let mut buf = Vec::new();
        render(&report(), false, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Previous scan:    never"));
        assert!(text.contains("Duplicates:       1 group(s), "));
        assert!(text.contains(&format!("{} reclaimable", format_size(1500u64, DECIMAL))));
        assert!(text.contains("    a.jpg"));
        assert!(text.contains("    b.jpg"));
        assert!(!text.contains("solo.jpg"));
    }

    #[test]
    fn test_render_all_groups() {
        let mut buf = Vec::new();
        render(&report(), true, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("solo.jpg"));
        assert!(text.contains("[JPG]"));
    }
}
