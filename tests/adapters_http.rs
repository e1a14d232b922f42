// tests/adapters_http.rs
//
// Adapters end to end over HTTP, served from fixtures by a local axum router.

mod common;

use axum::{http::StatusCode, routing::get, Router};
use chrono::{TimeZone, Utc};
use std::time::Duration;

use packers_pulse::ingest::providers::{
    bluesky::BlueskyProvider, google_news::GoogleNewsProvider, reddit::RedditProvider,
};
use packers_pulse::ingest::types::{SourceKind, SourceProvider};
use packers_pulse::scores::{fetch_games, TeamTarget};

// One post per payload carries wrongly typed fields; its siblings must survive.
const MIXED_BSKY: &str = r#"{"posts":[
    {"uri":"at://did:plc:a/app.bsky.feed.post/ok1","author":{"handle":"a.bsky.social"},
     "record":{"text":"well typed"},"indexedAt":"2025-09-01T11:00:00Z"},
    {"uri":"at://did:plc:b/app.bsky.feed.post/bad","author":{"handle":"b.bsky.social"},
     "record":{"text":"epoch instead of a string"},"indexedAt":1757152800}
]}"#;

const MIXED_REDDIT: &str = r#"{"data":{"children":[
    {"data":{"id":"ok","title":"well typed","url":"https://r.test/ok","created_utc":1756724400}},
    {"data":{"id":"bad","title":"quoted epoch","url":"https://r.test/bad","created_utc":"1756724400"}},
    {"data":{"id":"worse","title":42,"url":"https://r.test/worse","created_utc":[1]}}
]}}"#;

fn fixtures_router() -> Router {
    let bsky = common::fixture("bluesky_search.json");
    let rss = common::fixture("google_news.xml");
    let reddit = common::fixture("reddit_listing.json");
    let espn = common::fixture("espn_scoreboard.json");
    Router::new()
        .route("/xrpc/search", get(move || async move { bsky }))
        .route("/rss", get(move || async move { rss }))
        .route("/r/packers.json", get(move || async move { reddit }))
        .route("/scoreboard", get(move || async move { espn }))
        .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
        .route("/xrpc/mixed", get(|| async { MIXED_BSKY }))
        .route("/r/mixed.json", get(|| async { MIXED_REDDIT }))
}

fn packers() -> TeamTarget {
    TeamTarget {
        display_name: "Green Bay Packers".into(),
        abbreviation: "GB".into(),
    }
}

#[tokio::test]
async fn bluesky_runs_every_query() {
    let base = common::serve(fixtures_router()).await;
    let p = BlueskyProvider::new(common::client(0), vec!["Packers".into(), "#GoPackGo".into()])
        .with_endpoint(format!("{base}/xrpc/search"))
        .with_pause(Duration::from_millis(5));

    let run_at = Utc.with_ymd_and_hms(2025, 9, 1, 12, 30, 0).unwrap();
    let out = p.fetch_latest(run_at).await.unwrap();
    // two queries, two non-null posts each
    assert_eq!(out.len(), 4);
    assert!(out.iter().all(|r| r.source == SourceKind::Bluesky));
    assert_eq!(
        out[0].url,
        "https://bsky.app/profile/cheesehead.bsky.social/post/3kq2xyzpost1"
    );
    assert!(out[1].url.is_empty());
    assert!(out[1].author.is_empty());
    // null indexedAt falls back to the run time, not the fetch time
    assert_eq!(out[1].created_at, run_at);
}

#[tokio::test]
async fn mixed_typing_keeps_valid_posts() {
    let base = common::serve(fixtures_router()).await;
    let run_at = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();

    let bsky = BlueskyProvider::new(common::client(0), vec!["Packers".into()])
        .with_endpoint(format!("{base}/xrpc/mixed"));
    let out = bsky.fetch_latest(run_at).await.unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].created_at, Utc.with_ymd_and_hms(2025, 9, 1, 11, 0, 0).unwrap());
    assert_eq!(out[1].text, "epoch instead of a string");
    assert_eq!(out[1].created_at, run_at);

    let reddit = RedditProvider::new(common::client(0), vec![format!("{base}/r/mixed.json")]);
    let out = reddit.fetch_latest(run_at).await.unwrap();
    assert_eq!(out.len(), 3);
    let posted = Utc.timestamp_opt(1_756_724_400, 0).unwrap();
    assert_eq!(out[0].created_at, posted);
    assert_eq!(out[1].created_at, posted);
    assert_eq!(out[2].title, "");
    assert_eq!(out[2].url, "https://r.test/worse");
    assert_eq!(out[2].created_at, run_at);
}

#[tokio::test]
async fn bluesky_query_failure_is_isolated() {
    let base = common::serve(fixtures_router()).await;
    let p = BlueskyProvider::new(common::client(0), vec!["Packers".into()])
        .with_endpoint(format!("{base}/gone"));

    let out = p.fetch_latest(Utc::now()).await.expect("query errors do not fail the adapter");
    assert!(out.is_empty());
}

#[tokio::test]
async fn google_news_skips_failing_feed() {
    let base = common::serve(fixtures_router()).await;
    let p = GoogleNewsProvider::new(
        common::client(0),
        vec![format!("{base}/gone"), format!("{base}/rss")],
    );

    let out = p.fetch_latest(Utc::now()).await.unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].author, "ESPN");
    assert_eq!(out[0].title, "Packers sign veteran safety ahead of Week 1 - ESPN");
    assert_eq!(
        out[0].created_at,
        Utc.with_ymd_and_hms(2025, 9, 1, 10, 30, 0).unwrap()
    );
    assert!(!out[0].text.contains('<'));
    assert_eq!(out[1].title, "LaFleur on the run game & red zone woes");
    assert!(out.iter().all(|r| (r.score - 1.2).abs() < 1e-9));
}

#[tokio::test]
async fn reddit_listing_over_http() {
    let base = common::serve(fixtures_router()).await;
    let p = RedditProvider::new(common::client(0), vec![format!("{base}/r/packers.json")]);

    let out = p.fetch_latest(Utc::now()).await.unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].author, "titletown_fan");
    assert_eq!(
        out[1].url,
        "https://www.reddit.com/r/GreenBayPackers/comments/1abcd2/depth_chart/"
    );
    assert_eq!(out[1].created_at, Utc.timestamp_opt(1_756_720_800, 0).unwrap());
}

#[tokio::test]
async fn scoreboard_keeps_only_target_team() {
    let base = common::serve(fixtures_router()).await;
    let now = Utc.with_ymd_and_hms(2025, 9, 11, 1, 0, 0).unwrap();

    let games = fetch_games(&common::client(0), &format!("{base}/scoreboard"), &packers(), now).await;
    assert_eq!(games.len(), 2);
    let live: Vec<_> = games.iter().filter(|g| g.live).collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].label, "GB 17 @ WSH 10 • Q3 04:12");
}

#[tokio::test]
async fn scoreboard_failure_yields_empty_list() {
    let base = common::serve(fixtures_router()).await;
    let games = fetch_games(&common::client(1), &format!("{base}/gone"), &packers(), Utc::now()).await;
    assert!(games.is_empty());
}
