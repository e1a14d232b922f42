//! Packers Pulse: Binary Entrypoint
//! Runs the feed + scoreboard pipeline once, or forever on `interval_secs`.

use std::process::ExitCode;

use packers_pulse::config::PulseConfig;
use packers_pulse::ingest::scheduler::{run_every, SchedulerCfg};
use packers_pulse::persist::FileStore;
use packers_pulse::pipeline::run_all;
use packers_pulse::telemetry::Metrics;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; `PULSE_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("packers_pulse=info,ingest=info,warn"));

    let json = std::env::var("PULSE_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn dump_metrics(metrics: Option<&Metrics>, cfg: &PulseConfig) {
    let (Some(m), Some(path)) = (metrics, cfg.metrics_path.as_deref()) else {
        return;
    };
    if let Err(e) = m.write_textfile(path).await {
        tracing::warn!(error = ?e, path = %path.display(), "metrics textfile not written");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match PulseConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = ?e, "config load failed");
            return ExitCode::FAILURE;
        }
    };

    let metrics = match Metrics::install() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics recorder unavailable");
            None
        }
    };

    let store = FileStore::new(&cfg.output_dir);
    tracing::info!(
        topic = %cfg.topic,
        output_dir = %cfg.output_dir.display(),
        interval_secs = ?cfg.interval_secs,
        "packers-pulse starting"
    );

    match cfg.interval_secs {
        Some(interval_secs) => {
            let (cfg_ref, store_ref, metrics_ref) = (&cfg, &store, metrics.as_ref());
            run_every(
                SchedulerCfg {
                    interval_secs,
                    max_runs: None,
                },
                move || async move {
                    let res = run_all(cfg_ref, store_ref).await.map(|_| ());
                    dump_metrics(metrics_ref, cfg_ref).await;
                    res
                },
            )
            .await;
            ExitCode::SUCCESS
        }
        None => {
            let res = run_all(&cfg, &store).await;
            dump_metrics(metrics.as_ref(), &cfg).await;
            match res {
                Ok(report) => {
                    tracing::info!(
                        items = report.feed.committed_items,
                        outcome = ?report.feed.outcome,
                        games = report.scores.games,
                        "run complete"
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!(error = ?e, "run failed");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
