use std::fmt;

use anyhow::{anyhow, bail, Result};

use crate::process::utils::parse_year;

/// A single cell as loaded from a spreadsheet or CSV.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Value::Number(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// File path (or a label for in-memory tables); used in error messages.
    pub source: String,
    /// Column names, in file order. Duplicates are tolerated here.
    pub headers: Vec<String>,
    /// One `Vec<Value>` per row, each `headers.len()` long.
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(source: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Value::Missing);
                r
            })
            .collect();
        Self {
            source: source.into(),
            headers,
            rows,
        }
    }

    /// Builds a table from rows of cells where the first row holds the headers.
    pub fn from_grid(source: impl Into<String>, mut grid: Vec<Vec<Value>>) -> Result<Self> {
        let source = source.into();
        if grid.is_empty() {
            bail!("{source}: no header row");
        }
        let header_row = grid.remove(0);
        let headers = header_row
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                Value::Missing => format!("{UNNAMED_PREFIX}{i}"),
                other => other.to_string(),
            })
            .collect::<Vec<_>>();
        // drop fully blank rows; spreadsheets often pad the used range
        grid.retain(|r| r.iter().any(|v| !v.is_missing()));
        Ok(Self::new(source, headers, grid))
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("missing column '{}' in {}", name, self.source))
    }

    pub fn rename_column(mut self, from: &str, to: &str) -> Result<Self> {
        let idx = self.column_index(from)?;
        self.headers[idx] = to.to_string();
        Ok(self)
    }

    /// Keeps only columns for which `keep(index, header)` holds.
    pub fn retain_columns(self, mut keep: impl FnMut(usize, &str) -> bool) -> Self {
        let keep_idx: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(i, h)| keep(*i, h))
            .map(|(i, _)| i)
            .collect();
        self.select_indices(&keep_idx)
    }

    pub fn drop_columns(self, names: &[&str]) -> Result<Self> {
        for name in names {
            self.column_index(name)?;
        }
        Ok(self.retain_columns(|_, h| !names.contains(&h)))
    }

    pub fn drop_column_positions(self, positions: &[usize]) -> Result<Self> {
        if let Some(p) = positions.iter().find(|p| **p >= self.width()) {
            bail!(
                "{}: cannot drop column {} of a {}-column table",
                self.source,
                p,
                self.width()
            );
        }
        Ok(self.retain_columns(|i, _| !positions.contains(&i)))
    }

    pub fn filter_rows(mut self, column: &str, mut pred: impl FnMut(&Value) -> bool) -> Result<Self> {
        let idx = self.column_index(column)?;
        self.rows.retain(|r| pred(&r[idx]));
        Ok(self)
    }

    pub fn drop_trailing_rows(mut self, n: usize) -> Self {
        let keep = self.rows.len().saturating_sub(n);
        self.rows.truncate(keep);
        self
    }

    /// Drops every column holding at least one missing cell.
    pub fn drop_columns_with_missing(self) -> Self {
        let complete: Vec<usize> = (0..self.width())
            .filter(|&i| self.rows.iter().all(|r| !r[i].is_missing()))
            .collect();
        self.select_indices(&complete)
    }

    /// Drops columns holding a missing cell, transposes, then promotes the first
    /// transposed row (the old first column) to headers.
    ///
    /// The old header of each surviving column becomes the row label in column 0,
    /// whose header is the old first column's name.
    ///
    /// ```text
    /// Year  A    B          Year  2020  2021
    /// 2020  1    2    ->    B     2     3
    /// 2021  -    3
    /// ```
    pub fn transpose_with_header(self) -> Result<Self> {
        let table = self.drop_columns_with_missing();
        if table.width() == 0 {
            bail!("{}: every column contains missing values", table.source);
        }

        let mut headers = Vec::with_capacity(table.rows.len() + 1);
        headers.push(table.headers[0].clone());
        headers.extend(table.rows.iter().map(|r| r[0].to_string()));

        let rows = (1..table.width())
            .map(|j| {
                let mut row = Vec::with_capacity(table.rows.len() + 1);
                row.push(Value::Text(table.headers[j].clone()));
                row.extend(table.rows.iter().map(|r| r[j].clone()));
                row
            })
            .collect();

        Ok(Self::new(table.source, headers, rows))
    }

    /// Unpivots every column except `id` into `(id, variable, value)` rows.
    pub fn melt(&self, id: &str, var_name: &str, value_name: &str) -> Result<Self> {
        let id_idx = self.column_index(id)?;
        let mut rows = Vec::with_capacity(self.rows.len() * self.width().saturating_sub(1));
        for (j, header) in self.headers.iter().enumerate() {
            if j == id_idx {
                continue;
            }
            for r in &self.rows {
                rows.push(vec![
                    r[id_idx].clone(),
                    Value::Text(header.clone()),
                    r[j].clone(),
                ]);
            }
        }
        Ok(Self::new(
            self.source.clone(),
            vec![id.to_string(), var_name.to_string(), value_name.to_string()],
            rows,
        ))
    }

    /// Column indices whose header is a year label.
    pub fn year_columns(&self) -> Vec<(usize, i32)> {
        self.headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| parse_year(&Value::Text(h.clone())).map(|y| (i, y)))
            .collect()
    }

    fn select_indices(self, idx: &[usize]) -> Self {
        let headers = idx.iter().map(|&i| self.headers[i].clone()).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Self {
            source: self.source,
            headers,
            rows,
        }
    }
}

/// Header given to blank header cells, mirroring what spreadsheet tools emit.
pub const UNNAMED_PREFIX: &str = "Unnamed: ";

#[cfg(test)]
pub(crate) fn table(headers: &[&str], rows: Vec<Vec<Value>>) -> RawTable {
    RawTable::new(
        "test",
        headers.iter().map(|h| h.to_string()).collect(),
        rows,
    )
}

#[cfg(test)]
pub(crate) fn n(v: f64) -> Value {
    Value::Number(v)
}

#[cfg(test)]
pub(crate) fn t(s: &str) -> Value {
    Value::Text(s.to_string())
}
