// src/ingest/scheduler.rs
use anyhow::Result;
use metrics::counter;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval_secs: u64,
    /// Stop after this many runs; `None` runs forever.
    pub max_runs: Option<u64>,
}

/// Invoke `job` on a fixed interval. Each run is awaited before the next tick,
/// so runs never overlap; a slow run delays the schedule instead of stacking.
/// Failed runs are logged and the loop keeps going.
pub async fn run_every<F, Fut>(cfg: SchedulerCfg, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let period = Duration::from_secs(cfg.interval_secs.max(1));
    run_with_period(period, cfg.max_runs, &mut job).await
}

async fn run_with_period<F, Fut>(period: Duration, max_runs: Option<u64>, job: &mut F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut runs: u64 = 0;
    loop {
        if max_runs.is_some_and(|m| runs >= m) {
            break;
        }
        ticker.tick().await;
        runs += 1;

        counter!("pipeline_runs_total").increment(1);
        match job().await {
            Ok(()) => tracing::info!(target: "ingest", run = runs, "scheduled run done"),
            Err(e) => {
                counter!("pipeline_run_failures_total").increment(1);
                tracing::error!(target: "ingest", run = runs, error = ?e, "scheduled run failed");
            }
        }
    }
}
