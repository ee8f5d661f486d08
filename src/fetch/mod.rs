// src/fetch/mod.rs
//! Network side: catalog discovery and per-series spreadsheet downloads.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use crate::config::FetchConfig;

pub mod catalog;
pub mod retry;
pub mod series;

pub use catalog::{parse_catalog, resolve_catalog, CatalogEntry, SeriesDescriptor};
pub use series::{download_all, download_table, FetchOutcome, FetchReport};

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Form-encoded POST, the only request shape the statistics site needs.
pub trait FormPoster {
    fn post_form(&self, url: &str, form: &[(String, String)], timeout: Duration) -> Result<HttpReply>;
}

impl FormPoster for Client {
    fn post_form(&self, url: &str, form: &[(String, String)], timeout: Duration) -> Result<HttpReply> {
        let resp = self
            .post(url)
            .form(form)
            .timeout(timeout)
            .send()
            .with_context(|| format!("POST {}", url))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .with_context(|| format!("reading body from {}", url))?
            .to_vec();
        Ok(HttpReply { status, body })
    }
}

/// Blocking client carrying the configured headers on every request.
pub fn build_client(cfg: &FetchConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &cfg.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name '{}'", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header '{}'", name))?;
        headers.insert(name, value);
    }
    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .gzip(true)
        .timeout(cfg.download_timeout())
        .build()
        .context("building HTTP client")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_from_default_config() {
        assert!(build_client(&FetchConfig::default()).is_ok());
    }

    #[test]
    fn bad_header_is_rejected() {
        let mut cfg = FetchConfig::default();
        cfg.headers.insert("Bad Header".into(), "x".into());
        assert!(build_client(&cfg).is_err());
    }
}
