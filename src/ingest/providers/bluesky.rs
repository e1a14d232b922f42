// src/ingest/providers/bluesky.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::fetch::FetchClient;
use crate::ingest::timestamp::parse_timestamp_or;
use crate::ingest::types::{nullable, FeedRecord, Lenient, SourceKind, SourceProvider};
use crate::ingest::display_title;

pub const SEARCH_ENDPOINT: &str = "https://public.api.bsky.app/xrpc/app.bsky.feed.searchPosts";

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "nullable")]
    posts: Vec<Lenient<Post>>,
}

// Per-post fields are untrusted: a wrong type drops the field, not the response.
#[derive(Debug, Default, Deserialize)]
struct Post {
    #[serde(default)]
    uri: Lenient<String>,
    #[serde(default)]
    author: Lenient<Author>,
    #[serde(default)]
    record: Lenient<PostRecord>,
    #[serde(default, rename = "indexedAt")]
    indexed_at: Lenient<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Author {
    #[serde(default)]
    handle: Lenient<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PostRecord {
    #[serde(default)]
    text: Lenient<String>,
}

/// Map a search response into records. Posts without a handle or uri get an empty url.
pub fn map_response(resp: SearchResponse, now: DateTime<Utc>) -> Vec<FeedRecord> {
    resp.posts
        .into_iter()
        .filter_map(Lenient::into_inner)
        .map(|p| {
            let text = p.record.into_inner().and_then(|r| r.text.into_inner()).unwrap_or_default();
            let handle = p.author.into_inner().and_then(|a| a.handle.into_inner()).unwrap_or_default();
            let uri = p.uri.into_inner().unwrap_or_default();
            let post_id = uri.rsplit('/').next().unwrap_or_default();
            let url = if handle.is_empty() || post_id.is_empty() {
                String::new()
            } else {
                format!("https://bsky.app/profile/{handle}/post/{post_id}")
            };

            FeedRecord {
                title: display_title("", &text),
                url,
                author: handle,
                created_at: parse_timestamp_or(p.indexed_at.into_inner().as_deref(), now),
                source_id: uri,
                text,
                ..FeedRecord::seeded(SourceKind::Bluesky, now)
            }
        })
        .collect()
}

/// Decode a raw `searchPosts` body and map it.
pub fn records_from_json(body: &str, now: DateTime<Utc>) -> Result<Vec<FeedRecord>> {
    let resp: SearchResponse = serde_json::from_str(body).context("parsing bluesky search json")?;
    Ok(map_response(resp, now))
}

/// Searches a fixed list of queries one after another, pausing between them
/// to stay under the public API's rate limit.
pub struct BlueskyProvider {
    http: FetchClient,
    endpoint: String,
    queries: Vec<String>,
    limit: u32,
    pause: Duration,
}

impl BlueskyProvider {
    pub fn new(http: FetchClient, queries: Vec<String>) -> Self {
        Self {
            http,
            endpoint: SEARCH_ENDPOINT.to_string(),
            queries,
            limit: 20,
            pause: Duration::from_millis(600),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    async fn search(&self, query: &str, now: DateTime<Utc>) -> Result<Vec<FeedRecord>> {
        let limit = self.limit.to_string();
        let url = reqwest::Url::parse_with_params(&self.endpoint, &[("q", query), ("limit", &limit)])
            .with_context(|| format!("building bluesky url from {}", self.endpoint))?;
        let resp: SearchResponse = self.http.get_json(url.as_str(), &[]).await?;

        let t0 = std::time::Instant::now();
        let out = map_response(resp, now);
        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for BlueskyProvider {
    async fn fetch_latest(&self, now: DateTime<Utc>) -> Result<Vec<FeedRecord>> {
        let mut out = Vec::new();
        for (i, q) in self.queries.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pause).await;
            }
            match self.search(q, now).await {
                Ok(mut v) => {
                    tracing::debug!(target: "ingest", query = %q, count = v.len(), "bluesky query ok");
                    out.append(&mut v);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, query = %q, provider = "Bluesky", "query failed");
                    counter!("ingest_provider_errors_total").increment(1);
                }
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "Bluesky"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::TITLE_MAX_CHARS;
    use chrono::TimeZone;

    #[test]
    fn builds_permalink_and_truncated_title() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
        let long = "a".repeat(TITLE_MAX_CHARS + 30);
        let body = format!(
            r#"{{"posts":[{{"uri":"at://did:plc:abc/app.bsky.feed.post/3kxyz",
                "author":{{"handle":"cheesehead.bsky.social"}},
                "record":{{"text":"{long}"}},
                "indexedAt":"2025-09-06T11:00:00.000Z"}}]}}"#
        );
        let out = records_from_json(&body, now).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].url,
            "https://bsky.app/profile/cheesehead.bsky.social/post/3kxyz"
        );
        assert_eq!(out[0].title.chars().count(), TITLE_MAX_CHARS);
        assert_eq!(out[0].score, 1.0);
    }

    #[test]
    fn missing_fields_degrade() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
        let out = records_from_json(r#"{"posts":[{}, null, {"author":null}]}"#, now).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.url.is_empty() && r.text.is_empty()));
        assert!(out.iter().all(|r| r.created_at == now));

        assert!(records_from_json(r#"{"posts":null}"#, now).unwrap().is_empty());
        assert!(records_from_json(r#"{}"#, now).unwrap().is_empty());
    }

    #[test]
    fn badly_typed_post_keeps_its_siblings() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
        let body = r#"{"posts":[
            {"uri":"at://did:plc:a/app.bsky.feed.post/p1","author":{"handle":"a.bsky.social"},
             "record":{"text":"first"},"indexedAt":1757152800},
            {"uri":"at://did:plc:b/app.bsky.feed.post/p2","author":"b.bsky.social",
             "record":{"text":"second"},"indexedAt":"2025-09-06T11:00:00Z"},
            42
        ]}"#;
        let out = records_from_json(body, now).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "first");
        assert_eq!(out[0].created_at, now);
        assert_eq!(out[0].url, "https://bsky.app/profile/a.bsky.social/post/p1");
        assert_eq!(out[1].text, "second");
        assert!(out[1].url.is_empty());
        assert_eq!(out[1].created_at, Utc.with_ymd_and_hms(2025, 9, 6, 11, 0, 0).unwrap());
    }
}
