use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::process::{
    mappings::{CategoryMap, Lookup},
    normalized::{GroupedTable, Key, KeyShape, NormalizedTable},
    raw_table::RawTable,
    utils::clean_str,
};

/// Census population figures are published in units of 10^7 people.
pub const POPULATION_SCALE: f64 = 1e7;

/// Period-over-period percent change. The first entry has no prior period.
///
/// Missing neighbours and a zero previous value give `None`.
pub fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    out.extend(values.first().map(|_| None));
    out.extend(values.windows(2).map(|w| match (w[0], w[1]) {
        (Some(prev), Some(cur)) if prev != 0.0 => Some((cur - prev) / prev * 100.0),
        _ => None,
    }));
    out
}

impl NormalizedTable {
    /// Appends `growth_column` = percent change of `column` in key order.
    pub fn with_growth(mut self, column: &str, growth_column: &str) -> Result<Self> {
        let growth = pct_change(&self.column(column)?);
        self.push_column(growth_column, growth)?;
        Ok(self)
    }
}

impl GroupedTable {
    /// Growth computed independently inside every group.
    pub fn with_growth(mut self, column: &str, growth_column: &str) -> Result<Self> {
        self.groups = self
            .groups
            .into_iter()
            .map(|(group, table)| Ok((group, table.with_growth(column, growth_column)?)))
            .collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn scale_column(mut self, column: &str, factor: f64) -> Result<Self> {
        for table in self.groups.values_mut() {
            table.map_column(column, |v| v * factor)?;
        }
        Ok(self)
    }
}

pub fn gdp_growth(table: NormalizedTable) -> Result<NormalizedTable> {
    table.with_growth("GDP", "GDP_Growth")
}

pub fn population_growth(table: NormalizedTable) -> Result<NormalizedTable> {
    table.with_growth("Population", "Population_Growth")
}

/// Rescales regional population to people, then adds per-region growth.
pub fn regional_population_growth(grouped: GroupedTable) -> Result<GroupedTable> {
    grouped
        .scale_column("Population", POPULATION_SCALE)?
        .with_growth("Population", "Population_Growth")
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = clean_str(raw);
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(&s, f).ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Date-stamped observations → per-year mean of `value_column`.
pub fn yearly_average(raw: &RawTable, date_column: &str, value_column: &str) -> Result<NormalizedTable> {
    let date_idx = raw.column_index(date_column)?;
    let value_idx = raw.column_index(value_column)?;

    let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for row in &raw.rows {
        let cell = row[date_idx].to_string();
        let date = parse_date(&cell)
            .ok_or_else(|| anyhow!("{}: unparseable date '{}' in '{}'", raw.source, cell, date_column))?;
        let entry = sums.entry(date.year()).or_insert((0.0, 0));
        if let Some(v) = row[value_idx].as_f64() {
            entry.0 += v;
            entry.1 += 1;
        }
    }

    NormalizedTable::from_series(
        KeyShape::Year,
        value_column,
        sums.into_iter()
            .map(|(y, (sum, n))| (Key::year(y), (n > 0).then(|| sum / n as f64))),
    )
}

/// Average of every year column across the rows of `raw`, after dropping rows
/// with any missing year value. `label_column` (e.g. `Country`) is ignored.
pub fn cross_section_mean(raw: RawTable, label_column: &str, value_name: &str) -> Result<NormalizedTable> {
    let label_idx = raw.column_index(label_column)?;
    let years = raw
        .year_columns()
        .into_iter()
        .filter(|(i, _)| *i != label_idx)
        .collect::<Vec<_>>();
    if years.is_empty() {
        bail!("{}: no year columns", raw.source);
    }

    let year_idx: Vec<usize> = years.iter().map(|(i, _)| *i).collect();
    let complete: Vec<&Vec<_>> = raw
        .rows
        .iter()
        .filter(|r| year_idx.iter().all(|&i| r[i].as_f64().is_some()))
        .collect();
    if complete.len() < raw.rows.len() {
        warn!(
            source = %raw.source,
            dropped = raw.rows.len() - complete.len(),
            "rows with missing values excluded from average"
        );
    }

    NormalizedTable::from_series(
        KeyShape::Year,
        value_name,
        years.iter().map(|&(i, y)| {
            let mean = (!complete.is_empty()).then(|| {
                complete.iter().filter_map(|r| r[i].as_f64()).sum::<f64>() / complete.len() as f64
            });
            (Key::year(y), mean)
        }),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Mean,
}

/// Re-groups `grouped` by the category each group label maps to, combining
/// groups in the same bucket key by key. Unmapped labels are warned about and
/// left out; they are returned so callers can report them.
pub fn collapse_categories<'a>(
    grouped: &'a GroupedTable,
    map: &CategoryMap,
    aggregation: Aggregation,
    group_column: &str,
) -> Result<(GroupedTable, Vec<&'a str>)> {
    let labels = grouped.groups.keys().map(String::as_str);
    let lookups = map.map_all(labels);

    let mut buckets: BTreeMap<&'static str, Vec<&NormalizedTable>> = BTreeMap::new();
    let mut unmapped = Vec::new();
    for ((_, table), lookup) in grouped.groups.iter().zip(lookups) {
        match lookup {
            Lookup::Mapped(category) => buckets.entry(category).or_default().push(table),
            Lookup::Unmapped(label) => unmapped.push(label),
        }
    }

    let mut out = GroupedTable::new(group_column);
    for (category, tables) in buckets {
        out.insert(category, combine(&tables, aggregation)?)?;
    }
    Ok((out, unmapped))
}

fn combine(tables: &[&NormalizedTable], aggregation: Aggregation) -> Result<NormalizedTable> {
    let first = tables
        .first()
        .ok_or_else(|| anyhow!("no tables to combine"))?;
    let columns = first.columns().to_vec();
    let width = columns.len();

    let mut acc: BTreeMap<Key, Vec<(f64, usize)>> = BTreeMap::new();
    for table in tables {
        if table.columns() != columns.as_slice() || table.shape() != first.shape() {
            bail!(
                "cannot combine tables with columns [{}] and [{}]",
                columns.join(", "),
                table.columns().join(", ")
            );
        }
        for (key, values) in table.rows() {
            let slot = acc.entry(*key).or_insert_with(|| vec![(0.0, 0); width]);
            for (s, v) in slot.iter_mut().zip(values) {
                if let Some(v) = v {
                    s.0 += v;
                    s.1 += 1;
                }
            }
        }
    }

    let mut out = NormalizedTable::new(first.shape(), columns);
    for (key, slots) in acc {
        let values = slots
            .into_iter()
            .map(|(sum, n)| match (n, aggregation) {
                (0, _) => None,
                (_, Aggregation::Sum) => Some(sum),
                (n, Aggregation::Mean) => Some(sum / n as f64),
            })
            .collect();
        out.insert(key, values)?;
    }
    Ok(out)
}
