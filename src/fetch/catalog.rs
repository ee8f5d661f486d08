// src/fetch/catalog.rs
use anyhow::{bail, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

use crate::config::FetchConfig;
use crate::fetch::FormPoster;

/// One downloadable series as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDescriptor {
    pub industry: String,
    pub series_id: String,
}

impl SeriesDescriptor {
    pub fn new(industry: impl Into<String>, series_id: impl Into<String>) -> Self {
        Self {
            industry: industry.into(),
            series_id: series_id.into(),
        }
    }
}

/// One `table.catalog` as found on the page; either field may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub industry: Option<String>,
    pub series_id: Option<String>,
}

impl CatalogEntry {
    pub fn complete(industry: impl Into<String>, series_id: impl Into<String>) -> Self {
        Self {
            industry: Some(industry.into()),
            series_id: Some(series_id.into()),
        }
    }

    /// `None` unless both fields were present.
    pub fn descriptor(&self) -> Option<SeriesDescriptor> {
        match (&self.industry, &self.series_id) {
            (Some(industry), Some(series_id)) => Some(SeriesDescriptor::new(industry, series_id)),
            _ => None,
        }
    }
}

const INDUSTRY_HEADER: &str = "Industry:";
const SERIES_HEADER: &str = "Series Id:";

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Extracts one `CatalogEntry` per `table.catalog`, in document order.
///
/// Each catalog table is a stack of `<tr><th>Key:</th><td>value</td></tr>` rows.
/// Tables missing either field are kept as incomplete entries and warned about.
pub fn parse_catalog(html: &str) -> Vec<CatalogEntry> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table.catalog").expect("selector should parse");
    let row_sel = Selector::parse("tr").expect("selector should parse");
    let th_sel = Selector::parse("th").expect("selector should parse");
    let td_sel = Selector::parse("td").expect("selector should parse");

    let mut out = Vec::new();
    for (i, table) in document.select(&table_sel).enumerate() {
        let mut industry = None;
        let mut series_id = None;
        for tr in table.select(&row_sel) {
            let (Some(th), Some(td)) = (tr.select(&th_sel).next(), tr.select(&td_sel).next()) else {
                continue;
            };
            match text_of(th).as_str() {
                INDUSTRY_HEADER => industry = Some(text_of(td)),
                SERIES_HEADER => series_id = Some(text_of(td)),
                _ => {}
            }
        }
        if industry.is_none() || series_id.is_none() {
            warn!(table = i, ?industry, ?series_id, "catalog table missing industry or series id");
        }
        out.push(CatalogEntry { industry, series_id });
    }
    out
}

/// Queries the catalog for the configured series. Errors propagate; no retry.
#[instrument(level = "info", skip_all, fields(endpoint = %cfg.endpoint))]
pub fn resolve_catalog<C: FormPoster>(client: &C, cfg: &FetchConfig) -> Result<Vec<CatalogEntry>> {
    let reply = client.post_form(&cfg.endpoint, &cfg.catalog_form(), cfg.catalog_timeout())?;
    if !reply.is_success() {
        bail!("catalog query to {} failed with status {}", cfg.endpoint, reply.status);
    }
    let html = String::from_utf8_lossy(&reply.body);
    debug!(bytes = reply.body.len(), "catalog page received");

    let entries = parse_catalog(&html);
    info!(
        tables = entries.len(),
        complete = entries.iter().filter(|e| e.descriptor().is_some()).count(),
        "resolved catalog"
    );
    Ok(entries)
}
