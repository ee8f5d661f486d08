use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use anyhow::{anyhow, bail, Result};

/// Row key of a normalized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub year: i32,
    pub month: Option<u32>,
}

impl Key {
    pub fn year(year: i32) -> Self {
        Self { year, month: None }
    }

    pub fn year_month(year: i32, month: u32) -> Self {
        Self {
            year,
            month: Some(month),
        }
    }

    pub fn shape(&self) -> KeyShape {
        match self.month {
            Some(_) => KeyShape::YearMonth,
            None => KeyShape::Year,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(m) => write!(f, "{}-{:02}", self.year, m),
            None => write!(f, "{}", self.year),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    Year,
    YearMonth,
}

impl KeyShape {
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            KeyShape::Year => &["Year"],
            KeyShape::YearMonth => &["Year", "Month"],
        }
    }
}

/// Which side's keys survive a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Every key of the left table; right values missing where unmatched.
    #[default]
    Left,
    /// Every key of the right table; left values missing where unmatched.
    Right,
    /// Keys present on both sides.
    Inner,
    /// Keys present on either side.
    Outer,
}

/// Year or (Year, Month) keyed table with one `Option<f64>` per value column.
///
/// Keys are unique and sorted by construction. A table with several value
/// columns is what the aggregators produce after joining indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    shape: KeyShape,
    columns: Vec<String>,
    rows: BTreeMap<Key, Vec<Option<f64>>>,
}

impl NormalizedTable {
    pub fn new(shape: KeyShape, columns: Vec<String>) -> Self {
        Self {
            shape,
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Builds a single-column table, rejecting duplicate keys.
    pub fn from_series(
        shape: KeyShape,
        column: impl Into<String>,
        points: impl IntoIterator<Item = (Key, Option<f64>)>,
    ) -> Result<Self> {
        let mut table = Self::new(shape, vec![column.into()]);
        for (key, value) in points {
            table.insert(key, vec![value])?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, key: Key, values: Vec<Option<f64>>) -> Result<()> {
        if key.shape() != self.shape {
            bail!("key {key} does not match table shape {:?}", self.shape);
        }
        if values.len() != self.columns.len() {
            bail!(
                "row {key} has {} values for {} columns",
                values.len(),
                self.columns.len()
            );
        }
        if self.rows.insert(key, values).is_some() {
            bail!("duplicate key {key} in {}", self.columns.join(", "));
        }
        Ok(())
    }

    pub fn shape(&self) -> KeyShape {
        self.shape
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.rows.keys()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Key, &Vec<Option<f64>>)> {
        self.rows.iter()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| anyhow!("missing column '{}' (have: {})", name, self.columns.join(", ")))
    }

    /// Values of one column in key order.
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.values().map(|v| v[idx]).collect())
    }

    pub fn get(&self, key: &Key, column: &str) -> Option<f64> {
        let idx = self.column_index(column).ok()?;
        self.rows.get(key).and_then(|v| v[idx])
    }

    pub fn rename_column(mut self, from: &str, to: &str) -> Result<Self> {
        let idx = self.column_index(from)?;
        self.columns[idx] = to.to_string();
        Ok(self)
    }

    /// Appends a column computed from the existing column values in key order.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if self.columns.contains(&name) {
            bail!("column '{name}' already exists");
        }
        if values.len() != self.rows.len() {
            bail!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            );
        }
        for (row, v) in self.rows.values_mut().zip(values) {
            row.push(v);
        }
        self.columns.push(name);
        Ok(())
    }

    pub fn map_column(&mut self, name: &str, f: impl Fn(f64) -> f64) -> Result<()> {
        let idx = self.column_index(name)?;
        for row in self.rows.values_mut() {
            row[idx] = row[idx].map(&f);
        }
        Ok(())
    }

    pub fn filter_years(mut self, years: &RangeInclusive<i32>) -> Self {
        self.rows.retain(|k, _| years.contains(&k.year));
        self
    }

    /// Index-aligned join. Value columns of `other` are appended after ours.
    pub fn join(self, other: NormalizedTable, kind: JoinKind) -> Result<Self> {
        if self.shape != other.shape {
            bail!(
                "cannot join {:?}-keyed table with {:?}-keyed table",
                self.shape,
                other.shape
            );
        }
        if let Some(dup) = other.columns.iter().find(|c| self.columns.contains(c)) {
            bail!("column '{dup}' present on both sides of join");
        }

        let left_width = self.columns.len();
        let right_width = other.columns.len();
        let mut columns = self.columns;
        columns.extend(other.columns);

        let mut left = self.rows;
        let mut right = other.rows;
        let keys: Vec<Key> = match kind {
            JoinKind::Left => left.keys().copied().collect(),
            JoinKind::Right => right.keys().copied().collect(),
            JoinKind::Inner => left.keys().filter(|k| right.contains_key(k)).copied().collect(),
            JoinKind::Outer => {
                let mut all: Vec<Key> = left.keys().chain(right.keys()).copied().collect();
                all.sort();
                all.dedup();
                all
            }
        };

        let mut rows = BTreeMap::new();
        for key in keys {
            let mut values = left.remove(&key).unwrap_or_else(|| vec![None; left_width]);
            values.extend(right.remove(&key).unwrap_or_else(|| vec![None; right_width]));
            rows.insert(key, values);
        }

        Ok(Self {
            shape: self.shape,
            columns,
            rows,
        })
    }
}

/// Normalized tables partitioned by a categorical label such as a region.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedTable {
    pub group_column: String,
    pub groups: BTreeMap<String, NormalizedTable>,
}

impl GroupedTable {
    pub fn new(group_column: impl Into<String>) -> Self {
        Self {
            group_column: group_column.into(),
            groups: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, group: impl Into<String>, table: NormalizedTable) -> Result<()> {
        let group = group.into();
        if self.groups.contains_key(&group) {
            bail!("duplicate group '{group}' in {}", self.group_column);
        }
        self.groups.insert(group, table);
        Ok(())
    }

    pub fn get(&self, group: &str) -> Option<&NormalizedTable> {
        self.groups.get(group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monthly(column: &str, points: &[(i32, u32, f64)]) -> NormalizedTable {
        NormalizedTable::from_series(
            KeyShape::YearMonth,
            column,
            points.iter().map(|&(y, m, v)| (Key::year_month(y, m), Some(v))),
        )
        .unwrap()
    }

    #[test]
    fn left_join_keeps_left_rows_and_fills_missing() -> Result<()> {
        let left = monthly("16-19", &[(2020, 1, 10.0), (2020, 2, 11.0), (2020, 3, 12.0)]);
        let right = monthly("20-24", &[(2020, 2, 7.0), (2021, 1, 8.0)]);

        let merged = left.join(right, JoinKind::Left)?;

        assert_eq!(merged.columns(), &["16-19", "20-24"]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(&Key::year_month(2020, 1), "20-24"), None);
        assert_eq!(merged.get(&Key::year_month(2020, 2), "20-24"), Some(7.0));
        assert_eq!(merged.get(&Key::year_month(2020, 3), "16-19"), Some(12.0));
        assert!(!merged.keys().any(|k| *k == Key::year_month(2021, 1)));
        Ok(())
    }

    #[test]
    fn right_join_keeps_right_rows() -> Result<()> {
        let left = monthly("a", &[(2020, 1, 1.0)]);
        let right = monthly("b", &[(2020, 2, 2.0), (2020, 1, 3.0)]);
        let merged = left.join(right, JoinKind::Right)?;
        let keys: Vec<_> = merged.keys().copied().collect();
        assert_eq!(keys, vec![Key::year_month(2020, 1), Key::year_month(2020, 2)]);
        assert_eq!(merged.get(&Key::year_month(2020, 2), "a"), None);
        Ok(())
    }

    #[test]
    fn inner_and_outer_joins() -> Result<()> {
        let a = monthly("a", &[(2020, 1, 1.0), (2020, 2, 2.0)]);
        let b = monthly("b", &[(2020, 2, 3.0), (2020, 3, 4.0)]);
        assert_eq!(a.clone().join(b.clone(), JoinKind::Inner)?.len(), 1);
        assert_eq!(a.join(b, JoinKind::Outer)?.len(), 3);
        Ok(())
    }

    #[test]
    fn duplicate_keys_and_columns_are_rejected() {
        let dup = NormalizedTable::from_series(
            KeyShape::Year,
            "GDP",
            vec![(Key::year(2020), Some(1.0)), (Key::year(2020), Some(2.0))],
        );
        assert!(dup.is_err());

        let a = monthly("a", &[(2020, 1, 1.0)]);
        let b = monthly("a", &[(2020, 1, 1.0)]);
        assert!(a.join(b, JoinKind::Left).is_err());
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let a = monthly("a", &[(2020, 1, 1.0)]);
        let b = NormalizedTable::from_series(KeyShape::Year, "b", vec![(Key::year(2020), None)])
            .unwrap();
        assert!(a.join(b, JoinKind::Outer).is_err());
    }

    #[test]
    fn year_filter_is_inclusive() {
        let t = monthly("a", &[(2009, 12, 1.0), (2010, 1, 2.0), (2020, 12, 3.0), (2021, 1, 4.0)]);
        let t = t.filter_years(&(2010..=2020));
        assert_eq!(t.len(), 2);
    }
}
