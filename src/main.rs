use anyhow::Result;
use econscraper::{config::PipelineConfig, fetch::build_client, pipeline};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,econscraper=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let cfg_path = PipelineConfig::path_from_env();
    let cfg = PipelineConfig::load(&cfg_path)?;
    info!(jobs = cfg.jobs.len(), fetch = cfg.fetch.enabled, "config ready");

    // ─── 3) run ──────────────────────────────────────────────────────
    let start = Instant::now();
    let client = build_client(&cfg.fetch)?;
    let summary = pipeline::run(&cfg, &client)?;

    if let Some(report) = &summary.fetch {
        for d in &report.abandoned {
            warn!(industry = %d.industry, series = %d.series_id, "not downloaded");
        }
        for e in &report.incomplete {
            warn!(industry = ?e.industry, series = ?e.series_id, "incomplete catalog entry");
        }
    }
    for (output, err) in &summary.failed {
        error!("{} failed: {}", output, err);
    }

    info!(
        written = summary.written.len(),
        failed = summary.failed.len(),
        elapsed = ?start.elapsed(),
        "all done"
    );
    Ok(())
}
