// src/ingest/providers/google_news.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::fetch::FetchClient;
use crate::ingest::timestamp::parse_timestamp_or;
use crate::ingest::types::{FeedRecord, SourceKind, SourceProvider};
use crate::ingest::{content_hash, normalize_text};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<TextNode>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
}

/// Element whose attributes we ignore, e.g. `<source url="..">Name</source>`.
#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse one RSS document into records.
pub fn parse_feed(xml: &str, now: DateTime<Utc>) -> Result<Vec<FeedRecord>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing google news rss xml")?;

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = it.title.as_deref().map(normalize_text).unwrap_or_default();
        let text = it.description.as_deref().map(normalize_text).unwrap_or_default();
        let url = it.link.map(|l| l.trim().to_string()).unwrap_or_default();
        let guid = it.guid.map(|g| g.value.trim().to_string()).unwrap_or_default();
        let author = it
            .creator
            .filter(|c| !c.trim().is_empty())
            .or_else(|| it.source.map(|s| s.value))
            .map(|a| a.trim().to_string())
            .unwrap_or_default();

        let source_id = if !url.is_empty() {
            url.clone()
        } else if !guid.is_empty() {
            guid
        } else {
            content_hash(&title)
        };

        out.push(FeedRecord {
            source_id,
            author,
            created_at: parse_timestamp_or(it.pub_date.as_deref(), now),
            title,
            text,
            url,
            ..FeedRecord::seeded(SourceKind::GoogleNews, now)
        });
    }

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// Fetches each configured feed URL in order; a failing URL is skipped.
pub struct GoogleNewsProvider {
    http: FetchClient,
    feeds: Vec<String>,
}

impl GoogleNewsProvider {
    pub fn new(http: FetchClient, feeds: Vec<String>) -> Self {
        Self { http, feeds }
    }

    async fn fetch_feed(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<FeedRecord>> {
        let body = self.http.get_text(url, &[]).await?;
        parse_feed(&body, now)
    }
}

#[async_trait]
impl SourceProvider for GoogleNewsProvider {
    async fn fetch_latest(&self, now: DateTime<Utc>) -> Result<Vec<FeedRecord>> {
        let mut out = Vec::new();
        for url in &self.feeds {
            match self.fetch_feed(url, now).await {
                Ok(mut v) => out.append(&mut v),
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, url = %url, provider = "GoogleNews", "feed failed");
                    counter!("ingest_provider_errors_total").increment(1);
                }
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "GoogleNews"
    }
}

/// XML only knows five named entities; HTML ones show up in feed bodies anyway.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
