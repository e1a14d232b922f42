//! # Run Orchestrator
//! One pipeline run: adapters → merge/dedupe/boost → rank → persist, then the
//! independent scoreboard branch. Adapter failures only shrink the input set;
//! errors returned from here are fatal for the run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::gauge;
use serde::Serialize;
use std::time::Duration;

use crate::config::pulse::{PulseConfig, ScoreboardConfig};
use crate::ingest::fetch::FetchClient;
use crate::ingest::providers::{
    bluesky::BlueskyProvider, google_news::GoogleNewsProvider, reddit::RedditProvider,
};
use crate::ingest::types::SourceProvider;
use crate::ingest::{self, MergeStats};
use crate::persist::{self, PersistOutcome, SnapshotStore};
use crate::rank::{rank_feed, rank_games};
use crate::scores::{self, GameSnapshot};

#[derive(Debug, Clone, Serialize)]
pub struct FeedRunReport {
    pub fetched: usize,
    pub kept: usize,
    pub duplicates: usize,
    pub provider_errors: usize,
    pub outcome: PersistOutcome,
    /// Items in the snapshot actually written (the prior one when preserved).
    pub committed_items: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoresRunReport {
    pub games: usize,
    pub live: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub feed: FeedRunReport,
    pub scores: ScoresRunReport,
}

/// HTTP client configured from `[fetch]`.
pub fn build_http(cfg: &PulseConfig) -> Result<FetchClient> {
    Ok(FetchClient::new(&cfg.fetch.user_agent)?
        .with_timeout(cfg.fetch.timeout())
        .with_retries(cfg.fetch.retries)
        .with_pause(cfg.fetch.retry_pause()))
}

/// Fixed adapter list, in fetch order: Bluesky, Google News, Reddit.
pub fn build_providers(cfg: &PulseConfig, http: &FetchClient) -> Vec<Box<dyn SourceProvider>> {
    vec![
        Box::new(
            BlueskyProvider::new(http.clone(), cfg.bluesky.queries.clone())
                .with_endpoint(cfg.bluesky.endpoint.clone())
                .with_limit(cfg.bluesky.limit)
                .with_pause(Duration::from_millis(cfg.bluesky.pause_ms)),
        ),
        Box::new(GoogleNewsProvider::new(http.clone(), cfg.rss.feeds.clone())),
        Box::new(RedditProvider::new(http.clone(), cfg.reddit.feeds.clone())),
    ]
}

/// Feed branch. The prior snapshot is read only when this run produced nothing.
pub async fn run_feed<S: SnapshotStore + ?Sized>(
    providers: &[Box<dyn SourceProvider>],
    store: &S,
    topic: &str,
    now: DateTime<Utc>,
) -> Result<FeedRunReport> {
    let collected = ingest::collect(providers, now).await;
    let (merged, stats) = ingest::merge_and_boost(now, collected.records);
    record_merge_stats(&stats);
    let ranked = rank_feed(merged);

    let prior = if ranked.is_empty() {
        store.read_feed().await.context("reading prior snapshot")?
    } else {
        None
    };

    let decision = persist::decide(now, ranked, prior);
    let outcome = persist::commit(store, &decision, topic).await?;
    let snapshot = decision.snapshot();

    let report = FeedRunReport {
        fetched: stats.raw,
        kept: stats.kept,
        duplicates: stats.duplicates,
        provider_errors: collected.provider_errors,
        outcome,
        committed_items: snapshot.items.len(),
        generated_at: snapshot.generated_at,
    };

    match outcome {
        PersistOutcome::CommitNew => tracing::info!(
            target: "ingest",
            fetched = report.fetched,
            kept = report.kept,
            dedup = report.duplicates,
            provider_errors = report.provider_errors,
            "feed committed"
        ),
        PersistOutcome::PreservePrevious => tracing::warn!(
            target: "ingest",
            provider_errors = report.provider_errors,
            preserved_items = report.committed_items,
            generated_at = %report.generated_at,
            "no fresh items; preserved previous snapshot"
        ),
    }
    Ok(report)
}

/// Scoreboard branch. Always rewrites the game snapshot, empty on failure.
pub async fn run_scores<S: SnapshotStore + ?Sized>(
    http: &FetchClient,
    cfg: &ScoreboardConfig,
    store: &S,
    now: DateTime<Utc>,
) -> Result<ScoresRunReport> {
    let http = http
        .clone()
        .with_timeout(Duration::from_secs(cfg.timeout_secs));
    let games = rank_games(scores::fetch_games(&http, &cfg.url, &cfg.target(), now).await);

    let report = ScoresRunReport {
        games: games.len(),
        live: games.iter().filter(|g| g.live).count(),
    };
    store
        .write_games(&GameSnapshot {
            updated_at: now,
            games,
        })
        .await
        .context("writing game snapshot")?;

    gauge!("scores_games").set(report.games as f64);
    tracing::info!(target: "ingest", games = report.games, live = report.live, "scores written");
    Ok(report)
}

/// Full run from config. Both branches are attempted even if the first fails;
/// the first fatal error is returned.
pub async fn run_all<S: SnapshotStore + ?Sized>(cfg: &PulseConfig, store: &S) -> Result<RunReport> {
    store.prepare().await?;
    let http = build_http(cfg)?;
    let providers = build_providers(cfg, &http);
    let now = Utc::now();

    let feed = run_feed(&providers, store, &cfg.topic, now).await;
    let scores = run_scores(&http, &cfg.scoreboard, store, now).await;

    Ok(RunReport {
        feed: feed.context("feed run")?,
        scores: scores.context("scores run")?,
    })
}

fn record_merge_stats(stats: &MergeStats) {
    metrics::counter!("ingest_kept_total").increment(stats.kept as u64);
    metrics::counter!("ingest_dedup_total").increment(stats.duplicates as u64);
}
