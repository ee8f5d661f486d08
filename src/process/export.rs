use anyhow::{Context, Result};
use csv::Writer;
use std::{fs, path::Path};
use tracing::info;

use crate::process::normalized::{GroupedTable, Key, KeyShape, NormalizedTable};

fn key_fields(shape: KeyShape, key: &Key) -> Vec<String> {
    match shape {
        KeyShape::Year => vec![key.year.to_string()],
        KeyShape::YearMonth => vec![key.year.to_string(), key.month.unwrap_or_default().to_string()],
    }
}

fn value_field(v: &Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes `table` as a tidy CSV: key columns, then one column per indicator.
/// Missing values are written as empty fields.
pub fn write_csv(table: &NormalizedTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let mut header: Vec<String> = table.shape().key_columns().iter().map(|s| s.to_string()).collect();
    header.extend(table.columns().iter().cloned());
    w.write_record(&header)?;

    for (key, values) in table.rows() {
        let mut record = key_fields(table.shape(), key);
        record.extend(values.iter().map(value_field));
        w.write_record(&record)?;
    }
    w.flush()?;
    info!(path = %path.display(), rows = table.len(), "wrote table");
    Ok(())
}

/// Long-format CSV of a grouped table: group label, key columns, values.
pub fn write_grouped_csv(grouped: &GroupedTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let mut wrote_header = false;
    let mut rows = 0usize;
    for (group, table) in &grouped.groups {
        if !wrote_header {
            let mut header = vec![grouped.group_column.clone()];
            header.extend(table.shape().key_columns().iter().map(|s| s.to_string()));
            header.extend(table.columns().iter().cloned());
            w.write_record(&header)?;
            wrote_header = true;
        }
        for (key, values) in table.rows() {
            let mut record = vec![group.clone()];
            record.extend(key_fields(table.shape(), key));
            record.extend(values.iter().map(value_field));
            w.write_record(&record)?;
            rows += 1;
        }
    }
    w.flush()?;
    info!(path = %path.display(), groups = grouped.len(), rows, "wrote grouped table");
    Ok(())
}
