// src/ingest/providers/reddit.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::fetch::FetchClient;
use crate::ingest::timestamp::from_unix_secs_or;
use crate::ingest::types::{nullable, FeedRecord, Lenient, SourceKind, SourceProvider};

/// Base for permalinks, which the listing reports as site-relative paths.
pub const REDDIT_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Default, Deserialize)]
pub struct Listing {
    #[serde(default, deserialize_with = "nullable")]
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default, deserialize_with = "nullable")]
    children: Vec<Lenient<Child>>,
}

#[derive(Debug, Default, Deserialize)]
struct Child {
    #[serde(default)]
    data: Lenient<Post>,
}

// Per-post fields are untrusted: a wrong type drops the field, not the listing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Post {
    id: Lenient<String>,
    author: Lenient<String>,
    title: Lenient<String>,
    selftext: Lenient<String>,
    url: Lenient<String>,
    permalink: Lenient<String>,
    // number on reddit.com, quoted on some mirrors
    created_utc: Option<Value>,
}

fn epoch_secs(v: Option<Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn map_listing(listing: Listing, now: DateTime<Utc>) -> Vec<FeedRecord> {
    listing
        .data
        .children
        .into_iter()
        .filter_map(Lenient::into_inner)
        .filter_map(|c| c.data.into_inner())
        .map(|d| {
            let url = match (
                d.url.into_inner().filter(|u| !u.is_empty()),
                d.permalink.into_inner(),
            ) {
                (Some(u), _) => u,
                (None, Some(p)) if !p.is_empty() => format!("{REDDIT_BASE}{p}"),
                _ => String::new(),
            };
            FeedRecord {
                source_id: d.id.into_inner().unwrap_or_default(),
                author: d.author.into_inner().unwrap_or_default(),
                title: d.title.into_inner().unwrap_or_default(),
                text: d.selftext.into_inner().unwrap_or_default(),
                url,
                created_at: from_unix_secs_or(epoch_secs(d.created_utc), now),
                ..FeedRecord::seeded(SourceKind::Reddit, now)
            }
        })
        .collect()
}

pub fn records_from_json(body: &str, now: DateTime<Utc>) -> Result<Vec<FeedRecord>> {
    let listing: Listing = serde_json::from_str(body).context("parsing reddit listing json")?;
    Ok(map_listing(listing, now))
}

/// Pulls one or more subreddit JSON listings, isolating failures per URL.
pub struct RedditProvider {
    http: FetchClient,
    listings: Vec<String>,
}

impl RedditProvider {
    pub fn new(http: FetchClient, listings: Vec<String>) -> Self {
        Self { http, listings }
    }
}

#[async_trait]
impl SourceProvider for RedditProvider {
    async fn fetch_latest(&self, now: DateTime<Utc>) -> Result<Vec<FeedRecord>> {
        let mut out = Vec::new();
        for url in &self.listings {
            match self.http.get_json::<Listing>(url, &[]).await {
                Ok(listing) => {
                    let t0 = std::time::Instant::now();
                    out.extend(map_listing(listing, now));
                    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, url = %url, provider = "Reddit", "listing failed");
                    counter!("ingest_provider_errors_total").increment(1);
                }
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "Reddit"
    }
}
