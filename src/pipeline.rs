// src/pipeline.rs
//! catalog → downloads → reshaping jobs → CSV outputs.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{error, info, instrument};

use crate::{
    config::{Job, PipelineConfig},
    fetch::{download_all, resolve_catalog, FetchReport, FormPoster},
    process::{
        adapters, aggregate, derive, export,
        readers::{read_monthly_series, read_table},
    },
};

#[derive(Debug, Default)]
pub struct RunSummary {
    pub fetch: Option<FetchReport>,
    pub written: Vec<PathBuf>,
    /// `(output, error)` for every job that failed.
    pub failed: Vec<(String, String)>,
}

/// Runs the whole pipeline. Catalog errors abort; a failing job is logged and
/// the remaining jobs still run.
pub fn run<C: FormPoster>(cfg: &PipelineConfig, client: &C) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    if cfg.fetch.enabled {
        let entries = resolve_catalog(client, &cfg.fetch)?;
        summary.fetch = Some(download_all(client, &cfg.fetch, &entries)?);
    } else {
        info!("fetch disabled");
    }

    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("creating {}", cfg.output_dir.display()))?;

    for job in &cfg.jobs {
        match run_job(job, &cfg.output_dir) {
            Ok(path) => summary.written.push(path),
            Err(e) => {
                error!(output = job.output(), error = format!("{e:#}"), "job failed");
                summary.failed.push((job.output().to_string(), format!("{e:#}")));
            }
        }
    }
    Ok(summary)
}

#[instrument(level = "info", skip(job, out_dir), fields(output = job.output()))]
pub fn run_job(job: &Job, out_dir: &Path) -> Result<PathBuf> {
    let start = Instant::now();
    let dest = out_dir.join(job.output());

    match job {
        Job::MonthlyDirectory {
            dir,
            skip_rows,
            join,
            start_year,
            end_year,
            ..
        } => {
            let years = (start_year.is_some() || end_year.is_some())
                .then(|| start_year.unwrap_or(i32::MIN)..=end_year.unwrap_or(i32::MAX));
            let skip = *skip_rows;
            let table =
                aggregate::concat_directory(dir, |p| read_monthly_series(p, skip), *join, years)?;
            export::write_csv(&table, &dest)?;
        }
        Job::EurostatDirectory {
            dir,
            skip_rows,
            footer_rows,
            ..
        } => {
            let table = aggregate::merge_eurostat_directory(dir, *skip_rows, *footer_rows)?;
            export::write_csv(&table, &dest)?;
        }
        Job::EurGdp { path, skip_rows, .. } => {
            let table = adapters::process_eur_gdp(read_table(path, *skip_rows)?)?;
            export::write_csv(&derive::gdp_growth(table)?, &dest)?;
        }
        Job::EurUnemployment { path, skip_rows, .. } => {
            let table = adapters::process_eur_unemployment(read_table(path, *skip_rows)?)?;
            export::write_csv(&table, &dest)?;
        }
        Job::UnemploymentByGender { path, skip_rows, .. } => {
            let table = adapters::process_unemployment_by_gender(read_table(path, *skip_rows)?)?;
            export::write_csv(&table, &dest)?;
        }
        Job::UsaMinimumWage { path, skip_rows, .. } => {
            let table = adapters::usa_minimum_wage(read_table(path, *skip_rows)?)?;
            export::write_csv(&table, &dest)?;
        }
        Job::EurMinimumWage { path, skip_rows, .. } => {
            let table = derive::cross_section_mean(read_table(path, *skip_rows)?, "Country", "eur_wage")?;
            export::write_csv(&table, &dest)?;
        }
        Job::YearlyAverage {
            path,
            skip_rows,
            date_column,
            value_column,
            ..
        } => {
            let raw = read_table(path, *skip_rows)?;
            let table = derive::yearly_average(&raw, date_column, value_column)?;
            export::write_csv(&table, &dest)?;
        }
        Job::StatePopulation { path, skip_rows, .. } => {
            let grouped = adapters::process_state_population(read_table(path, *skip_rows)?)?;
            let grouped = derive::regional_population_growth(grouped)?;
            export::write_grouped_csv(&grouped, &dest)?;
        }
    }

    info!(elapsed = ?start.elapsed(), "job done");
    Ok(dest)
}
