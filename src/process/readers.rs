// src/process/readers.rs
use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use csv::ReaderBuilder;
use std::{fs::File, io::BufReader, path::Path};
use tracing::{debug, instrument};

use crate::process::{
    mappings::month_number,
    normalized::{Key, KeyShape, NormalizedTable},
    raw_table::{RawTable, Value, UNNAMED_PREFIX},
    utils::{clean_str, file_label, parse_cell, parse_year, parse_year_str},
};

/// File extensions the directory aggregators will pick up.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsm", "csv"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Loads a spreadsheet (first worksheet) or CSV, skips `skip_rows` leading rows
/// and promotes the next row to headers.
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_table<P: AsRef<Path>>(path: P, skip_rows: usize) -> Result<RawTable> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mut grid = match ext.as_str() {
        "csv" => read_csv_grid(path)?,
        "xlsx" | "xls" | "xlsm" => read_sheet_grid(path)?,
        other => bail!("unsupported file type '{}' for {}", other, path.display()),
    };

    if grid.len() <= skip_rows {
        bail!(
            "{} has {} rows, cannot skip {}",
            path.display(),
            grid.len(),
            skip_rows
        );
    }
    grid.drain(..skip_rows);

    let table = RawTable::from_grid(path.display().to_string(), grid)?;
    debug!(columns = table.width(), rows = table.rows.len(), "loaded table");
    Ok(table)
}

fn read_csv_grid(path: &Path) -> Result<Vec<Vec<Value>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut grid = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("reading {} line {}", path.display(), i + 1))?;
        grid.push(record.iter().map(parse_cell).collect());
    }
    Ok(grid)
}

/// Calamine ranges start at the first used cell; the leading blank rows and
/// columns are put back so `skip_rows` counts absolute sheet rows.
fn read_sheet_grid(path: &Path) -> Result<Vec<Vec<Value>>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("opening workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("{} has no worksheets", path.display()))?
        .with_context(|| format!("reading first worksheet of {}", path.display()))?;

    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let mut grid: Vec<Vec<Value>> = (0..first_row).map(|_| Vec::new()).collect();
    grid.extend(range.rows().map(|row| {
        let mut cells = vec![Value::Missing; first_col as usize];
        cells.extend(row.iter().map(sheet_value));
        cells
    }));
    Ok(grid)
}

/// Dates render as `%Y-%m-%d`, with the time appended only when it is not midnight.
fn date_value(dt: NaiveDateTime) -> Value {
    if dt.time().num_seconds_from_midnight() == 0 {
        Value::Text(dt.format("%Y-%m-%d").to_string())
    } else {
        Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

fn iso_value(raw: &str) -> Value {
    let s = clean_str(raw);
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(date_value)
        .unwrap_or(Value::Text(s))
}

/// Spreadsheet cell → `Value`; error cells count as missing.
pub fn sheet_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Missing,
        Data::Float(v) if v.is_finite() => Value::Number(*v),
        Data::Float(_) => Value::Missing,
        Data::Int(v) => Value::Number(*v as f64),
        Data::Bool(b) => Value::Text(b.to_string()),
        Data::String(s) => parse_cell(s),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => date_value(dt),
            None => Value::Text(clean_str(&cell.to_string())),
        },
        Data::DateTimeIso(s) => iso_value(s),
        other => Value::Text(clean_str(&other.to_string())),
    }
}

/// Fixed-row-skip monthly reader (BLS "excelTable" exports).
///
/// After skipping `skip_rows`, the sheet is `Year, Jan, …, Dec[, Annual]`.
/// Month columns are unpivoted into a `(Year, Month)`-keyed table whose single
/// value column is named after the file. Non-month columns are ignored.
pub fn read_monthly_series<P: AsRef<Path>>(path: P, skip_rows: usize) -> Result<NormalizedTable> {
    let path = path.as_ref();
    let raw = read_table(path, skip_rows)?;
    monthly_series_from_raw(&raw, &file_label(path))
}

pub fn monthly_series_from_raw(raw: &RawTable, label: &str) -> Result<NormalizedTable> {
    let long = raw.melt("Year", "Month", label)?;

    let mut points = Vec::with_capacity(long.rows.len());
    for row in &long.rows {
        let year = parse_year(&row[0])
            .ok_or_else(|| anyhow!("{}: invalid Year value '{}'", raw.source, row[0]))?;
        let month_label = row[1].to_string();
        let Some(month) = month_number(&month_label) else {
            debug!(source = %raw.source, column = %month_label, "skipping non-month column");
            continue;
        };
        points.push((Key::year_month(year, month), row[2].as_f64()));
    }

    NormalizedTable::from_series(KeyShape::YearMonth, label, points)
        .with_context(|| format!("normalizing {}", raw.source))
}

/// Eurostat wide-year export reader.
///
/// Skips `skip_rows` header rows and `footer_rows` trailing summary rows, drops
/// blank-header columns and the `TIME` label column, then unpivots the year
/// columns into a Year-keyed series named after the file.
pub fn read_eurostat<P: AsRef<Path>>(
    path: P,
    skip_rows: usize,
    footer_rows: usize,
) -> Result<NormalizedTable> {
    let path = path.as_ref();
    let raw = read_table(path, skip_rows)?.drop_trailing_rows(footer_rows);
    eurostat_from_raw(raw, &file_label(path))
}

pub fn eurostat_from_raw(raw: RawTable, label: &str) -> Result<NormalizedTable> {
    let raw = raw
        .retain_columns(|_, h| !h.starts_with(UNNAMED_PREFIX))
        .drop_columns(&["TIME"])?;

    let mut points = Vec::new();
    for (j, header) in raw.headers.iter().enumerate() {
        let year = parse_year_str(header)
            .ok_or_else(|| anyhow!("{}: column '{}' is not a year", raw.source, header))?;
        for row in &raw.rows {
            points.push((Key::year(year), row[j].as_f64()));
        }
    }

    NormalizedTable::from_series(KeyShape::Year, label, points)
        .with_context(|| format!("normalizing {}", raw.source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::derive::yearly_average;
    use crate::process::raw_table::{n, t, table};
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    /// Minimal single-sheet xlsx. Style 1 is the built-in `m/d/yyyy` date format.
    fn write_workbook(path: &Path, sheet_data: &str) -> Result<()> {
        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#
                    .to_string(),
            ),
            (
                "_rels/.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{SHEET_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_NS}/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="{REL_NS}/styles" Target="styles.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/styles.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="{SHEET_NS}"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#
                ),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{SHEET_NS}"><sheetData>{sheet_data}</sheetData></worksheet>"#
                ),
            ),
        ];

        let mut zip = zip::ZipWriter::new(fs::File::create(path)?);
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in parts {
            zip.start_file(name, options.clone())?;
            zip.write_all(body.as_bytes())?;
        }
        zip.finish()?;
        Ok(())
    }

    fn text_cell(r: &str, s: &str) -> String {
        format!(r#"<c r="{r}" t="inlineStr"><is><t>{s}</t></is></c>"#)
    }

    fn num_cell(r: &str, v: f64) -> String {
        format!(r#"<c r="{r}"><v>{v}</v></c>"#)
    }

    fn date_cell(r: &str, serial: u32) -> String {
        format!(r#"<c r="{r}" s="1"><v>{serial}</v></c>"#)
    }

    #[test]
    fn date_cells_read_as_iso_dates() -> Result<()> {
        crate::init_test_logging();
        let dir = tempdir()?;
        let path = dir.path().join("unemployment.xlsx");
        let rows = [
            (1, vec![text_cell("A1", "Date"), text_cell("B1", "All workers")]),
            (2, vec![date_cell("A2", 43831), num_cell("B2", 5.0)]),
            (3, vec![date_cell("A3", 44196), num_cell("B3", 5.1)]),
            (4, vec![date_cell("A4", 44197), num_cell("B4", 5.5)]),
        ];
        let sheet: String = rows
            .iter()
            .map(|(r, cells)| format!(r#"<row r="{r}">{}</row>"#, cells.concat()))
            .collect();
        write_workbook(&path, &sheet)?;

        let raw = read_table(&path, 0)?;
        assert_eq!(raw.rows[0][0], t("2020-01-01"));
        assert_eq!(raw.rows[1][0], t("2020-12-31"));

        let avg = yearly_average(&raw, "Date", "All workers")?;
        let y2020 = avg.get(&Key::year(2020), "All workers").expect("2020 average");
        assert!((y2020 - 5.05).abs() < 1e-9);
        assert_eq!(avg.get(&Key::year(2021), "All workers"), Some(5.5));
        Ok(())
    }

    #[test]
    fn skip_rows_counts_leading_blank_sheet_rows() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("teen.xlsx");
        let rows = [
            (2, vec![text_cell("A2", "Labor Force Statistics")]),
            (3, vec![text_cell("A3", "Year"), text_cell("B3", "Jan"), text_cell("C3", "Feb")]),
            (4, vec![num_cell("A4", 2020.0), num_cell("B4", 3.5), num_cell("C4", 3.6)]),
        ];
        let sheet: String = rows
            .iter()
            .map(|(r, cells)| format!(r#"<row r="{r}">{}</row>"#, cells.concat()))
            .collect();
        write_workbook(&path, &sheet)?;

        let raw = read_table(&path, 2)?;
        assert_eq!(raw.headers, vec!["Year", "Jan", "Feb"]);

        let series = read_monthly_series(&path, 2)?;
        assert_eq!(series.get(&Key::year_month(2020, 1), "teen"), Some(3.5));
        assert_eq!(series.get(&Key::year_month(2020, 2), "teen"), Some(3.6));
        Ok(())
    }

    #[test]
    fn iso_date_cells_drop_midnight() {
        assert_eq!(sheet_value(&Data::DateTimeIso("2021-03-04T00:00:00".into())), t("2021-03-04"));
        assert_eq!(
            sheet_value(&Data::DateTimeIso("2021-03-04T10:30:00".into())),
            t("2021-03-04 10:30:00")
        );
        assert_eq!(sheet_value(&Data::DateTimeIso("2021-03-04".into())), t("2021-03-04"));
    }

    #[test]
    fn csv_reader_skips_preamble_rows() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("16-19 years.csv");
        fs::write(
            &path,
            "Labor Force Statistics\nSeries Id: LNS14000012\nYear,Jan,Feb,Annual\n2020,12.1,..,12.0\n2021,14.0,13.5,13.8\n",
        )?;

        let raw = read_table(&path, 2)?;
        assert_eq!(raw.headers, vec!["Year", "Jan", "Feb", "Annual"]);
        assert_eq!(raw.rows[0][2], Value::Missing);

        let series = read_monthly_series(&path, 2)?;
        assert_eq!(series.columns(), &["16-19 years"]);
        assert_eq!(series.len(), 4);
        assert_eq!(series.get(&Key::year_month(2021, 2), "16-19 years"), Some(13.5));
        assert_eq!(series.get(&Key::year_month(2020, 2), "16-19 years"), None);
        Ok(())
    }

    #[test]
    fn monthly_reader_requires_year_column() {
        let raw = RawTable::new("bls/teen.xlsx", vec!["Period".into(), "Jan".into()], vec![]);
        let err = monthly_series_from_raw(&raw, "teen").unwrap_err().to_string();
        assert!(err.contains("'Year'") && err.contains("bls/teen.xlsx"), "{err}");
    }

    #[test]
    fn eurostat_drops_unnamed_and_time_columns() -> Result<()> {
        let raw = table(
            &["TIME", "2010", "Unnamed: 2", "2011", "Unnamed: 4"],
            vec![
                vec![t("European Union"), n(9.9), Value::Missing, n(9.8), t("b")],
                vec![t("Special value"), Value::Missing, Value::Missing, Value::Missing, Value::Missing],
            ],
        )
        .drop_trailing_rows(1);

        let series = eurostat_from_raw(raw, "unemployment")?;
        assert_eq!(series.len(), 2);
        assert_eq!(series.get(&Key::year(2011), "unemployment"), Some(9.8));
        Ok(())
    }

    #[test]
    fn eurostat_rejects_non_year_headers() {
        let raw = table(&["TIME", "GEO (Labels)"], vec![vec![t("x"), n(1.0)]]);
        assert!(eurostat_from_raw(raw, "x").is_err());
    }

    #[test]
    fn spreadsheet_cells_convert() {
        assert_eq!(sheet_value(&Data::Empty), Value::Missing);
        assert_eq!(sheet_value(&Data::Int(2020)), Value::Number(2020.0));
        assert_eq!(sheet_value(&Data::String("..".into())), Value::Missing);
        assert_eq!(sheet_value(&Data::String("Jan".into())), Value::Text("Jan".into()));
    }

    #[test]
    fn unsupported_extension_fails() {
        assert!(read_table("notes.txt", 0).is_err());
        assert!(is_supported(Path::new("a/B.XLSX")));
        assert!(!is_supported(Path::new("a/b.json")));
    }
}
