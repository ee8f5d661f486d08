// src/fetch/series.rs
use anyhow::{Context, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    thread,
};
use tempfile::NamedTempFile;
use tracing::{error, info, instrument, warn};

use crate::config::FetchConfig;
use crate::fetch::{
    catalog::{CatalogEntry, SeriesDescriptor},
    retry::{FetchState, RetryPolicy},
    FormPoster, HttpReply,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The target file already existed; no request was made.
    Cached(PathBuf),
    Downloaded { path: PathBuf, attempts: u32 },
    /// Every attempt failed; nothing was written.
    Abandoned { attempts: u32 },
}

/// `{folder}/{industry}_{series_id}.xlsx`, with path separators in the label replaced.
pub fn table_path(folder: &Path, industry: &str, series_id: &str) -> PathBuf {
    let safe = |s: &str| s.replace(['/', '\\'], "_");
    folder.join(format!("{}_{}.xlsx", safe(industry), safe(series_id)))
}

/// Writes through a temp file in the destination folder so a partial download
/// never sits at `dest`.
fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(dest)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming download onto {}", dest.display()))?;
    Ok(())
}

/// Downloads one series spreadsheet unless it is already on disk.
///
/// Transport errors and non-200 replies are retried per `policy` and then
/// abandoned without an error. Only local I/O failures are returned as `Err`.
#[instrument(level = "info", skip(client, cfg, policy, folder), fields(folder = %folder.display()))]
pub fn download_table<C: FormPoster>(
    client: &C,
    cfg: &FetchConfig,
    policy: &RetryPolicy,
    folder: &Path,
    industry: &str,
    series_id: &str,
) -> Result<FetchOutcome> {
    let dest = table_path(folder, industry, series_id);
    if dest.exists() {
        return Ok(FetchOutcome::Cached(dest));
    }

    let form = cfg.download_form_for(series_id);
    let mut state = policy.start();
    loop {
        let attempt = match state {
            FetchState::Succeeded { attempts } => {
                return Ok(FetchOutcome::Downloaded {
                    path: dest,
                    attempts,
                })
            }
            FetchState::Abandoned { attempts } => {
                warn!(attempts, "giving up on series");
                return Ok(FetchOutcome::Abandoned { attempts });
            }
            FetchState::Pending => 1,
            FetchState::Retrying(failed) => failed + 1,
        };
        if attempt > 1 && !policy.delay.is_zero() {
            thread::sleep(policy.delay);
        }
        match client.post_form(&cfg.endpoint, &form, cfg.download_timeout()) {
            Ok(HttpReply { status: 200, body }) => {
                write_atomically(&dest, &body)?;
                state = state.on_success();
                info!(path = %dest.display(), attempt, bytes = body.len(), "download complete");
            }
            Ok(reply) => {
                state = state.on_failure(policy);
                warn!(attempt, max = policy.max_attempts, status = reply.status, "download failed");
            }
            Err(e) => {
                state = state.on_failure(policy);
                warn!(attempt, max = policy.max_attempts, error = %e, "download failed");
            }
        }
    }
}

/// Tally of a `download_all` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub cached: usize,
    pub downloaded: usize,
    pub abandoned: Vec<SeriesDescriptor>,
    /// Catalog tables lacking an industry or series id; never requested.
    pub incomplete: Vec<CatalogEntry>,
}

/// Runs `download_table` for every complete catalog entry, one after another.
pub fn download_all<C: FormPoster>(
    client: &C,
    cfg: &FetchConfig,
    entries: &[CatalogEntry],
) -> Result<FetchReport> {
    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("creating {}", cfg.output_dir.display()))?;
    let policy = cfg.retry_policy();

    let mut report = FetchReport::default();
    for entry in entries {
        let Some(d) = entry.descriptor() else {
            warn!(industry = ?entry.industry, series = ?entry.series_id, "incomplete catalog entry skipped");
            report.incomplete.push(entry.clone());
            continue;
        };
        match download_table(client, cfg, &policy, &cfg.output_dir, &d.industry, &d.series_id)? {
            FetchOutcome::Cached(_) => report.cached += 1,
            FetchOutcome::Downloaded { .. } => report.downloaded += 1,
            FetchOutcome::Abandoned { .. } => {
                error!(industry = %d.industry, series = %d.series_id, "series not downloaded");
                report.abandoned.push(d);
            }
        }
    }
    info!(
        cached = report.cached,
        downloaded = report.downloaded,
        abandoned = report.abandoned.len(),
        incomplete = report.incomplete.len(),
        "fetch finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::ScriptedPoster;
    use anyhow::anyhow;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn no_wait(n: u32) -> RetryPolicy {
        RetryPolicy::new(n, Duration::ZERO)
    }

    #[test]
    fn existing_file_makes_no_requests() -> Result<()> {
        crate::init_test_logging();
        let dir = tempdir()?;
        let dest = table_path(dir.path(), "Mining", "CES1000000011");
        fs::write(&dest, b"cached")?;

        let poster = ScriptedPoster::new(vec![]);
        let out = download_table(&poster, &FetchConfig::default(), &no_wait(5), dir.path(), "Mining", "CES1000000011")?;

        assert_eq!(out, FetchOutcome::Cached(dest.clone()));
        assert_eq!(poster.call_count(), 0);
        assert_eq!(fs::read(&dest)?, b"cached");
        Ok(())
    }

    #[test]
    fn always_failing_server_is_abandoned_after_bound() -> Result<()> {
        crate::init_test_logging();
        let dir = tempdir()?;
        let poster = ScriptedPoster::new(vec![
            ScriptedPoster::ok(404, b""),
            Err(anyhow!("timed out")),
            ScriptedPoster::ok(500, b""),
            ScriptedPoster::ok(404, b""),
        ]);
        let delay = Duration::from_millis(20);
        let policy = RetryPolicy::new(4, delay);

        let start = Instant::now();
        let out = download_table(&poster, &FetchConfig::default(), &policy, dir.path(), "Mining", "CES1000000011")?;

        assert_eq!(out, FetchOutcome::Abandoned { attempts: 4 });
        assert_eq!(poster.call_count(), 4);
        assert!(start.elapsed() >= delay * 3);
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn success_on_third_attempt_writes_body() -> Result<()> {
        let dir = tempdir()?;
        let poster = ScriptedPoster::new(vec![
            ScriptedPoster::ok(503, b"busy"),
            Err(anyhow!("reset")),
            ScriptedPoster::ok(200, b"PK\x03\x04sheet"),
            ScriptedPoster::ok(200, b"never requested"),
        ]);

        let out = download_table(&poster, &FetchConfig::default(), &no_wait(5), dir.path(), "Construction", "CES2000000011")?;

        let dest = dir.path().join("Construction_CES2000000011.xlsx");
        assert_eq!(out, FetchOutcome::Downloaded { path: dest.clone(), attempts: 3 });
        assert_eq!(poster.call_count(), 3);
        assert_eq!(fs::read(&dest)?, b"PK\x03\x04sheet");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);

        let form = &poster.calls.borrow()[0];
        assert!(form.contains(&("series_id".to_string(), "CES2000000011".to_string())));
        assert!(form.contains(&("output_format".to_string(), "excelTable".to_string())));
        Ok(())
    }

    #[test]
    fn separators_in_industry_stay_inside_folder() {
        let p = table_path(Path::new("out"), "Trade/transportation", "CES4000000011");
        assert_eq!(p, Path::new("out").join("Trade_transportation_CES4000000011.xlsx"));
    }

    #[test]
    fn download_all_reports_each_outcome() -> Result<()> {
        let dir = tempdir()?;
        let cfg = FetchConfig {
            output_dir: dir.path().join("earnings"),
            max_attempts: 1,
            retry_delay_secs: 0.0,
            ..FetchConfig::default()
        };
        fs::create_dir_all(&cfg.output_dir)?;
        fs::write(table_path(&cfg.output_dir, "Mining", "A"), b"x")?;

        let poster = ScriptedPoster::new(vec![ScriptedPoster::ok(200, b"b"), ScriptedPoster::ok(500, b"")]);
        let gap = CatalogEntry {
            industry: Some("Utilities".into()),
            series_id: None,
        };
        let entries = vec![
            CatalogEntry::complete("Mining", "A"),
            gap.clone(),
            CatalogEntry::complete("Construction", "B"),
            CatalogEntry::complete("Retail", "C"),
        ];
        let report = download_all(&poster, &cfg, &entries)?;

        assert_eq!(report.cached, 1);
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.abandoned, vec![SeriesDescriptor::new("Retail", "C")]);
        assert_eq!(report.incomplete, vec![gap]);
        assert_eq!(poster.call_count(), 2);
        Ok(())
    }
}
