//! Source-specific adapters that reshape one publisher's layout into a
//! Year-keyed table.

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::process::{
    mappings::CENSUS_REGIONS,
    normalized::{GroupedTable, Key, KeyShape, NormalizedTable},
    raw_table::{RawTable, Value},
    utils::parse_year,
};

/// `df_transit`: drop incomplete columns, transpose, promote the first row.
pub fn df_transit(raw: RawTable) -> Result<RawTable> {
    raw.transpose_with_header()
}

/// Turns a two-column transposed table (year label, value) into a series.
fn two_column_series(table: &RawTable, value_name: &str) -> Result<NormalizedTable> {
    if table.width() != 2 {
        bail!(
            "{}: expected a (year, value) pair after transpose, got columns [{}]",
            table.source,
            table.headers.join(", ")
        );
    }
    let points = table
        .rows
        .iter()
        .map(|r| {
            let year = parse_year(&r[0])
                .ok_or_else(|| anyhow!("{}: '{}' is not a year", table.source, r[0]))?;
            Ok((Key::year(year), r[1].as_f64()))
        })
        .collect::<Result<Vec<_>>>()?;

    NormalizedTable::from_series(KeyShape::Year, value_name, points)
        .with_context(|| format!("normalizing {}", table.source))
}

/// World Bank single-country layout: `Country Name, Country Code, Indicator
/// Name, Indicator Code, 1960, …`. The code/indicator columns are dropped.
fn world_bank_series(raw: RawTable, value_name: &str) -> Result<NormalizedTable> {
    let raw = raw.drop_column_positions(&[1, 2, 3])?;
    if raw.rows.len() != 1 {
        bail!(
            "{}: expected exactly one country row, found {}",
            raw.source,
            raw.rows.len()
        );
    }
    two_column_series(&df_transit(raw)?, value_name)
}

pub fn process_eur_gdp(raw: RawTable) -> Result<NormalizedTable> {
    world_bank_series(raw, "GDP")
}

pub fn process_eur_unemployment(raw: RawTable) -> Result<NormalizedTable> {
    world_bank_series(raw, "Unemployment Rate")
}

/// OECD minimum-wage table (`Country, 1980, 1981, …`) → `(Year, USA_wage)`.
pub fn usa_minimum_wage(raw: RawTable) -> Result<NormalizedTable> {
    let usa = raw.filter_rows("Country", |v| v.as_text() == Some("United States"))?;
    if usa.rows.is_empty() {
        bail!("{}: no 'United States' row", usa.source);
    }
    two_column_series(&df_transit(usa)?, "USA_wage")
}

const GENDER_INDICATORS: [(&str, &str); 3] = [
    (
        "Unemployment, male (% of male labor force) (modeled ILO estimate)",
        "male_rate",
    ),
    (
        "Unemployment, female (% of female labor force) (modeled ILO estimate)",
        "female_rate",
    ),
    (
        "Unemployment, total (% of total labor force) (modeled ILO estimate)",
        "total_rate",
    ),
];

/// World Bank gender unemployment indicators → `(Year, male_rate, female_rate, total_rate)`.
pub fn process_unemployment_by_gender(raw: RawTable) -> Result<NormalizedTable> {
    let raw = raw.rename_column("Indicator Name", "Year")?;
    let label_idx = raw.column_index("Year")?;
    let raw = raw.retain_columns(|i, h| i == label_idx || parse_year(&Value::Text(h.into())).is_some());

    let tp = df_transit(raw)?;
    let columns = tp.headers[1..]
        .iter()
        .map(|h| {
            GENDER_INDICATORS
                .iter()
                .find(|(long, _)| *long == h.as_str())
                .map(|(_, short)| short.to_string())
                .unwrap_or_else(|| h.clone())
        })
        .collect::<Vec<_>>();

    let mut out = NormalizedTable::new(KeyShape::Year, columns);
    for row in &tp.rows {
        let year = parse_year(&row[0])
            .ok_or_else(|| anyhow!("{}: '{}' is not a year", tp.source, row[0]))?;
        out.insert(Key::year(year), row[1..].iter().map(Value::as_f64).collect())?;
    }
    Ok(out)
}

static TRAILING_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})$").expect("valid regex"));

const CENSUS_ID_COLUMNS: [&str; 4] = ["SUMLEV", "DIVISION", "REGION", "STATE"];

/// Census state population estimates → one `Population` series per census region.
///
/// Region rows are recognised by `NAME`; year columns by their last four digits
/// (`POPESTIMATE2010` → 2010). When two columns end in the same year the first wins.
pub fn process_state_population(raw: RawTable) -> Result<GroupedTable> {
    let raw = raw
        .drop_columns(&CENSUS_ID_COLUMNS)?
        .filter_rows("NAME", |v| {
            v.as_text().map(|s| CENSUS_REGIONS.contains(&s)).unwrap_or(false)
        })?;
    let name_idx = raw.column_index("NAME")?;

    let mut year_cols: Vec<(usize, i32)> = Vec::new();
    for (i, header) in raw.headers.iter().enumerate() {
        let Some(caps) = TRAILING_YEAR.captures(header) else {
            continue;
        };
        let year: i32 = caps[1].parse()?;
        if year_cols.iter().any(|(_, y)| *y == year) {
            warn!(source = %raw.source, column = %header, year, "duplicate year column ignored");
            continue;
        }
        year_cols.push((i, year));
    }
    debug!(years = year_cols.len(), "population year columns");

    let mut grouped = GroupedTable::new("Region");
    for row in &raw.rows {
        let region = row[name_idx].to_string();
        let series = NormalizedTable::from_series(
            KeyShape::Year,
            "Population",
            year_cols.iter().map(|&(i, y)| (Key::year(y), row[i].as_f64())),
        )?;
        grouped.insert(region, series)?;
    }
    Ok(grouped)
}
