// tests/e2e_smoke.rs
//
// Full run against a local upstream, persisted to a temp directory.

mod common;

use axum::{http::StatusCode, routing::get, Router};
use std::path::Path;

use packers_pulse::config::PulseConfig;
use packers_pulse::ingest::types::FeedSnapshot;
use packers_pulse::persist::{FileStore, PersistOutcome};
use packers_pulse::pipeline::run_all;
use packers_pulse::scores::GameSnapshot;

fn upstream() -> Router {
    let bsky = common::fixture("bluesky_search.json");
    let rss = common::fixture("google_news.xml");
    let reddit = common::fixture("reddit_listing.json");
    let espn = common::fixture("espn_scoreboard.json");
    Router::new()
        .route("/bsky", get(move || async move { bsky }))
        .route("/rss", get(move || async move { rss }))
        .route("/reddit", get(move || async move { reddit }))
        .route("/espn", get(move || async move { espn }))
}

fn down() -> Router {
    Router::new().fallback(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") })
}

fn config(base: &str, out: &Path) -> PulseConfig {
    let mut cfg = PulseConfig::default();
    cfg.output_dir = out.to_path_buf();
    cfg.fetch.timeout_secs = 2;
    cfg.fetch.retries = 0;
    cfg.fetch.retry_pause_ms = 0;
    cfg.bluesky.endpoint = format!("{base}/bsky");
    cfg.bluesky.queries = vec!["Packers".into()];
    cfg.bluesky.pause_ms = 0;
    cfg.rss.feeds = vec![format!("{base}/rss")];
    cfg.reddit.feeds = vec![format!("{base}/reddit")];
    cfg.scoreboard.url = format!("{base}/espn");
    cfg
}

fn read_feed(store: &FileStore) -> FeedSnapshot {
    serde_json::from_str(&std::fs::read_to_string(store.feed_path()).unwrap()).unwrap()
}

#[tokio::test]
async fn run_writes_all_outputs_then_survives_outage() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("docs");
    let store = FileStore::new(&out);

    // 1) healthy upstream
    let up = common::serve(upstream()).await;
    let report = run_all(&config(&up, &out), &store).await.expect("first run");
    assert_eq!(report.feed.outcome, PersistOutcome::CommitNew);
    assert_eq!(report.feed.kept, 6);
    assert_eq!(report.scores.games, 2);
    assert_eq!(report.scores.live, 1);

    let first = read_feed(&store);
    assert_eq!(first.items.len(), 6);
    assert!(first.items.iter().all(|r| r.created_at <= first.generated_at));
    for pair in first.items.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    let digest = std::fs::read_to_string(store.digest_path()).unwrap();
    assert!(digest.starts_with("<p>Packers buzz in the last day centers on "));
    let games: GameSnapshot =
        serde_json::from_str(&std::fs::read_to_string(store.scores_path()).unwrap()).unwrap();
    assert!(games.games[0].live);

    // 2) every upstream down: feed preserved, scoreboard emptied
    let dead = common::serve(down()).await;
    let report = run_all(&config(&dead, &out), &store).await.expect("second run");
    assert_eq!(report.feed.outcome, PersistOutcome::PreservePrevious);
    assert_eq!(report.feed.generated_at, first.generated_at);

    let kept = read_feed(&store);
    assert_eq!(kept.generated_at, first.generated_at);
    let urls = |s: &FeedSnapshot| s.items.iter().map(|r| r.url.clone()).collect::<Vec<_>>();
    assert_eq!(urls(&kept), urls(&first));
    let games: GameSnapshot =
        serde_json::from_str(&std::fs::read_to_string(store.scores_path()).unwrap()).unwrap();
    assert!(games.games.is_empty());
}
