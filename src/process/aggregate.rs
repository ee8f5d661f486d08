// src/process/aggregate.rs
use anyhow::{anyhow, bail, Context, Result};
use glob::glob;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::process::{
    normalized::{JoinKind, NormalizedTable},
    readers::{is_supported, read_eurostat},
};

/// Every supported table file directly under `dir`, sorted by name.
pub fn list_table_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*", glob::Pattern::escape(&dir.display().to_string()));
    let mut files: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file() && is_supported(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Reads every file in `dir` with `reader` and successively joins the results.
///
/// The first file (by name) is the initial left side; each later file is joined
/// on with `join`. The result is key-sorted and, when `years` is given, limited
/// to that inclusive range.
#[instrument(level = "info", skip(dir, reader), fields(dir = %dir.as_ref().display()))]
pub fn concat_directory<P, F>(
    dir: P,
    reader: F,
    join: JoinKind,
    years: Option<RangeInclusive<i32>>,
) -> Result<NormalizedTable>
where
    P: AsRef<Path>,
    F: Fn(&Path) -> Result<NormalizedTable>,
{
    let dir = dir.as_ref();
    let files = list_table_files(dir)?;
    if files.is_empty() {
        bail!("no table files found under {}", dir.display());
    }

    let mut merged: Option<NormalizedTable> = None;
    for file in &files {
        let table = reader(file).with_context(|| format!("reading {}", file.display()))?;
        debug!(file = %file.display(), rows = table.len(), "loaded");
        merged = Some(match merged {
            None => table,
            Some(acc) => acc
                .join(table, join)
                .with_context(|| format!("joining {}", file.display()))?,
        });
    }

    let mut merged = merged.ok_or_else(|| anyhow!("nothing merged from {}", dir.display()))?;
    if let Some(range) = years {
        merged = merged.filter_years(&range);
    }
    info!(files = files.len(), rows = merged.len(), columns = merged.columns().len(), "merged");
    Ok(merged)
}

/// Eurostat exports in `dir`, Year-keyed, left-joined onto the first file.
pub fn merge_eurostat_directory<P: AsRef<Path>>(
    dir: P,
    skip_rows: usize,
    footer_rows: usize,
) -> Result<NormalizedTable> {
    concat_directory(
        dir,
        |path| read_eurostat(path, skip_rows, footer_rows),
        JoinKind::Left,
        None,
    )
}
