//! JSON export: an object mapping each hex digest to its member paths.

use crate::dupes::DuplicateGroups;
use anyhow::Result;
use std::collections::BTreeMap;
use std::io::Write;

/// Serializes the digest to paths map, pretty-printed.
///
/// Singleton groups are left out unless `include_singletons` is set. Paths
/// that are not valid UTF-8 are written lossily.
pub fn render<W: Write>(groups: &DuplicateGroups, include_singletons: bool, mut writer: W) -> Result<()> {
    let map: BTreeMap<String, Vec<String>> = groups
        .to_path_map(include_singletons)
        .into_iter()
        .map(|(hash, paths)| {
            let shown = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
            (hash, shown)
        })
        .collect();
    serde_json::to_writer_pretty(&mut writer, &map)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
