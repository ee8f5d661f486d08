use std::path::Path;

use crate::process::raw_table::Value;

/// Placeholder some publishers (OECD, Eurostat) use for "no data".
pub const MISSING_PLACEHOLDER: &str = "..";

/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// 2) Turn a raw text cell into a `Value`, mapping every missing marker to `Missing`.
pub fn parse_cell(raw: &str) -> Value {
    let cleaned = clean_str(raw);
    if is_missing_marker(&cleaned) {
        return Value::Missing;
    }
    // thousands separators show up in census exports
    let numeric = cleaned.replace(',', "");
    match numeric.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Number(v),
        Ok(_) => Value::Missing,
        Err(_) => Value::Text(cleaned),
    }
}

fn is_missing_marker(s: &str) -> bool {
    s.is_empty()
        || s == MISSING_PLACEHOLDER
        || s.eq_ignore_ascii_case("nan")
        || s.eq_ignore_ascii_case("n/a")
        || s == ":"
}

/// Parses a year label such as `"2010"`, `"2010.0"` or `2010` held as a number.
pub fn parse_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(v) if v.fract() == 0.0 && (0.0..=9999.0).contains(v) => Some(*v as i32),
        Value::Text(s) => parse_year_str(s),
        _ => None,
    }
}

pub fn parse_year_str(s: &str) -> Option<i32> {
    let s = clean_str(s);
    if let Ok(y) = s.parse::<i32>() {
        return (0..=9999).contains(&y).then_some(y);
    }
    match s.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && (0.0..=9999.0).contains(&v) => Some(v as i32),
        _ => None,
    }
}

/// Base name without extension, used as the value column label.
pub fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_become_missing() {
        assert_eq!(parse_cell(".."), Value::Missing);
        assert_eq!(parse_cell("  "), Value::Missing);
        assert_eq!(parse_cell("NaN"), Value::Missing);
        assert_eq!(parse_cell("\"3.5\""), Value::Number(3.5));
        assert_eq!(parse_cell("1,234"), Value::Number(1234.0));
        assert_eq!(parse_cell("Belgium"), Value::Text("Belgium".into()));
    }

    #[test]
    fn years_parse_from_text_and_numbers() {
        assert_eq!(parse_year(&Value::Text("1961".into())), Some(1961));
        assert_eq!(parse_year(&Value::Text("1961.0".into())), Some(1961));
        assert_eq!(parse_year(&Value::Number(2020.0)), Some(2020));
        assert_eq!(parse_year(&Value::Number(2020.5)), None);
        assert_eq!(parse_year(&Value::Text("Country Name".into())), None);
    }

    #[test]
    fn label_is_file_stem() {
        assert_eq!(file_label(Path::new("data/16-19 years.xlsx")), "16-19 years");
    }
}
