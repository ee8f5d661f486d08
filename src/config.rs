// src/config.rs
//! Pipeline configuration, loaded from YAML with every field defaulted.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};
use url::Url;

use crate::fetch::retry::RetryPolicy;
use crate::process::JoinKind;

pub const CONFIG_ENV: &str = "ECONSCRAPER_CONFIG";
pub const COOKIE_ENV: &str = "ECONSCRAPER_COOKIE";
pub const DEFAULT_CONFIG_PATH: &str = "econscraper.yaml";

const BLS_ENDPOINT: &str = "https://data.bls.gov/pdq/SurveyOutputServlet";

/// CES average weekly earnings series, one per supersector.
const DEFAULT_SERIES: &[&str] = &[
    "CES0500000011",
    "CES0600000011",
    "CES1000000011",
    "CES2000000011",
    "CES3000000011",
    "CES3100000011",
    "CES3200000011",
    "CES0800000011",
    "CES4000000011",
    "CES4142000011",
    "CES4200000011",
    "CES4300000011",
    "CES4422000011",
    "CES5000000011",
    "CES5500000011",
    "CES6000000011",
    "CES6500000011",
    "CES7000000011",
    "CES8000000011",
];

const CATALOG_DIRECTIVES: &[(&str, &str)] = &[
    ("survey", "lf"),
    ("htmlpage", "cesbtab3.htm"),
    ("format", ""),
    ("html_tables", ""),
    ("delimiter", ""),
    ("catalog", ""),
    ("print_line_length", ""),
    ("lines_per_page", ""),
    ("row_stub_key", ""),
    ("year", ""),
    ("date", ""),
    ("net_change_start", ""),
    ("net_change_end", ""),
    ("percent_change_start", ""),
    ("percent_change_end", ""),
];

const DOWNLOAD_FORM: &[(&str, &str)] = &[
    ("request_action", "get_data"),
    ("reformat", "true"),
    ("from_results_page", "true"),
    ("years_option", "specific_years"),
    ("delimiter", "comma"),
    ("output_type", "multi"),
    ("periods_option", "all_periods"),
    ("output_view", "data"),
    ("output_format", "excelTable"),
    ("original_output_type", "default"),
    ("annualAveragesRequested", "false"),
];

fn pairs(src: &[(&str, &str)]) -> Vec<(String, String)> {
    src.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub enabled: bool,
    pub endpoint: String,
    /// Where `{industry}_{series}.xlsx` files are written.
    pub output_dir: PathBuf,
    pub max_attempts: u32,
    pub retry_delay_secs: f64,
    pub download_timeout_secs: u64,
    pub catalog_timeout_secs: u64,
    /// Series ids sent with the catalog query.
    pub series_ids: Vec<String>,
    pub catalog_directives: Vec<(String, String)>,
    /// Download form; `series_id` is appended per request.
    pub download_form: Vec<(String, String)>,
    /// Extra request headers (session cookies go here or in `ECONSCRAPER_COOKIE`).
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let headers = [
            ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
            ("Origin", "https://data.bls.gov"),
            ("Referer", BLS_ENDPOINT),
            ("User-Agent", concat!("econscraper/", env!("CARGO_PKG_VERSION"))),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            enabled: true,
            endpoint: BLS_ENDPOINT.to_string(),
            output_dir: PathBuf::from("Average_Weekly_Earnings"),
            max_attempts: 5,
            retry_delay_secs: 5.0,
            download_timeout_secs: 10,
            catalog_timeout_secs: 15,
            series_ids: DEFAULT_SERIES.iter().map(|s| s.to_string()).collect(),
            catalog_directives: pairs(CATALOG_DIRECTIVES),
            download_form: pairs(DOWNLOAD_FORM),
            headers,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs_f64(self.retry_delay_secs))
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    /// Catalog query body: one `series_id` pair per series, then the directives.
    pub fn catalog_form(&self) -> Vec<(String, String)> {
        self.series_ids
            .iter()
            .map(|id| ("series_id".to_string(), id.clone()))
            .chain(self.catalog_directives.iter().cloned())
            .collect()
    }

    pub fn download_form_for(&self, series_id: &str) -> Vec<(String, String)> {
        let mut form = self.download_form.clone();
        form.push(("series_id".to_string(), series_id.to_string()));
        form
    }
}

fn default_monthly_skip() -> usize {
    11
}

/// One reshaping job; `output` is a file name under `PipelineConfig::output_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Directory of BLS monthly exports joined on (Year, Month).
    MonthlyDirectory {
        dir: PathBuf,
        #[serde(default = "default_monthly_skip")]
        skip_rows: usize,
        #[serde(default)]
        join: JoinKind,
        start_year: Option<i32>,
        end_year: Option<i32>,
        output: String,
    },
    /// Directory of Eurostat exports left-joined on Year.
    EurostatDirectory {
        dir: PathBuf,
        #[serde(default)]
        skip_rows: usize,
        #[serde(default)]
        footer_rows: usize,
        output: String,
    },
    EurGdp {
        path: PathBuf,
        #[serde(default)]
        skip_rows: usize,
        output: String,
    },
    EurUnemployment {
        path: PathBuf,
        #[serde(default)]
        skip_rows: usize,
        output: String,
    },
    UnemploymentByGender {
        path: PathBuf,
        #[serde(default)]
        skip_rows: usize,
        output: String,
    },
    UsaMinimumWage {
        path: PathBuf,
        #[serde(default)]
        skip_rows: usize,
        output: String,
    },
    EurMinimumWage {
        path: PathBuf,
        #[serde(default)]
        skip_rows: usize,
        output: String,
    },
    YearlyAverage {
        path: PathBuf,
        #[serde(default)]
        skip_rows: usize,
        date_column: String,
        value_column: String,
        output: String,
    },
    StatePopulation {
        path: PathBuf,
        #[serde(default)]
        skip_rows: usize,
        output: String,
    },
}

impl Job {
    pub fn output(&self) -> &str {
        match self {
            Job::MonthlyDirectory { output, .. }
            | Job::EurostatDirectory { output, .. }
            | Job::EurGdp { output, .. }
            | Job::EurUnemployment { output, .. }
            | Job::UnemploymentByGender { output, .. }
            | Job::UsaMinimumWage { output, .. }
            | Job::EurMinimumWage { output, .. }
            | Job::YearlyAverage { output, .. }
            | Job::StatePopulation { output, .. } => output,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub jobs: Vec<Job>,
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            jobs: Vec::new(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(text).context("parsing pipeline config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads `path` if it exists, otherwise the defaults; then applies env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            info!(path = %path.display(), "loaded config");
            Self::from_yaml(&text)?
        } else {
            info!(path = %path.display(), "no config file; using defaults");
            Self::default()
        };
        if let Ok(cookie) = std::env::var(COOKIE_ENV) {
            debug!("cookie header taken from {}", COOKIE_ENV);
            cfg.fetch.headers.insert("Cookie".to_string(), cookie);
        }
        Ok(cfg)
    }

    /// Config path from `ECONSCRAPER_CONFIG`, falling back to `econscraper.yaml`.
    pub fn path_from_env() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.fetch.endpoint)
            .with_context(|| format!("invalid endpoint '{}'", self.fetch.endpoint))?;
        if !(self.fetch.retry_delay_secs.is_finite() && self.fetch.retry_delay_secs >= 0.0) {
            bail!("retry_delay_secs must be a non-negative number");
        }
        for job in &self.jobs {
            if let Job::MonthlyDirectory {
                start_year: Some(s),
                end_year: Some(e),
                ..
            } = job
            {
                if s > e {
                    bail!("job '{}': start_year {} is after end_year {}", job.output(), s, e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bls_scraper() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.fetch.max_attempts, 5);
        assert_eq!(cfg.fetch.retry_policy().delay, Duration::from_secs(5));
        assert_eq!(cfg.fetch.series_ids.len(), 19);
        let form = cfg.fetch.catalog_form();
        assert_eq!(form[0], ("series_id".to_string(), "CES0500000011".to_string()));
        assert!(form.contains(&("survey".to_string(), "lf".to_string())));
        let dl = cfg.fetch.download_form_for("CES0500000011");
        assert_eq!(dl.last().unwrap().1, "CES0500000011");
        assert!(!cfg.fetch.headers.contains_key("Cookie"));
    }

    #[test]
    fn yaml_overrides_and_jobs() -> Result<()> {
        let cfg = PipelineConfig::from_yaml(
            r#"
fetch:
  max_attempts: 2
  retry_delay_secs: 0.5
  headers:
    Cookie: "JSESSIONID=abc"
output_dir: out
jobs:
  - kind: monthly_directory
    dir: data/unemployment_by_age
    join: right
    start_year: 2010
    end_year: 2020
    output: age.csv
  - kind: eur_gdp
    path: data/eu_gdp.csv
    skip_rows: 4
    output: eu_gdp.csv
"#,
        )?;
        assert_eq!(cfg.fetch.max_attempts, 2);
        assert_eq!(cfg.fetch.endpoint, BLS_ENDPOINT);
        assert_eq!(cfg.fetch.headers.get("Cookie").map(String::as_str), Some("JSESSIONID=abc"));
        assert_eq!(cfg.jobs.len(), 2);
        match &cfg.jobs[0] {
            Job::MonthlyDirectory { skip_rows, join, .. } => {
                assert_eq!(*skip_rows, 11);
                assert_eq!(*join, JoinKind::Right);
            }
            other => panic!("unexpected job {other:?}"),
        }
        assert_eq!(cfg.jobs[1].output(), "eu_gdp.csv");
        Ok(())
    }

    #[test]
    fn bad_endpoint_and_year_range_are_rejected() {
        assert!(PipelineConfig::from_yaml("fetch:\n  endpoint: not a url\n").is_err());
        let bad = r#"
jobs:
  - kind: monthly_directory
    dir: x
    start_year: 2020
    end_year: 2010
    output: x.csv
"#;
        assert!(PipelineConfig::from_yaml(bad).is_err());
    }
}
