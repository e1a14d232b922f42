// src/ingest/mod.rs
pub mod fetch;
pub mod providers;
pub mod scheduler;
pub mod timestamp;
pub mod types;

use crate::ingest::types::{FeedRecord, SourceProvider};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Titles derived from body text are cut to this many characters.
pub const TITLE_MAX_CHARS: usize = 120;

const DAY_MS: f64 = 24.0 * 3600.0 * 1000.0;

/// One-time metrics registration (so series show up in the exported text).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Records produced by adapters.");
        describe_counter!(
            "ingest_kept_total",
            "Records kept after deduplication."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Records dropped as duplicates of an earlier key."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Adapter fetch/parse errors (per query or URL)."
        );
        describe_counter!("fetch_retries_total", "HTTP attempts that were retried.");
        describe_counter!(
            "fetch_failures_total",
            "HTTP requests that exhausted their retry budget."
        );
        describe_histogram!("ingest_parse_ms", "Adapter payload mapping time in milliseconds.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last ran."
        );
        describe_counter!("persist_committed_total", "Runs that committed a fresh snapshot.");
        describe_counter!(
            "persist_preserved_total",
            "Runs that re-committed the previous snapshot."
        );
        describe_counter!("pipeline_runs_total", "Scheduled pipeline runs started.");
        describe_counter!("pipeline_run_failures_total", "Scheduled runs that failed.");
        describe_gauge!("scores_games", "Games in the last written scoreboard.");
    });
}

/// Normalize snippet text: decode entities, strip tags, fold quotes and whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }
    out
}

/// First `max` characters of `s` (char-boundary safe).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Shared headline rule: native title, else body text cut to 120 chars.
/// Empty when both are empty; callers pick their own generic phrase.
pub fn display_title(title: &str, text: &str) -> String {
    if !title.is_empty() {
        title.to_string()
    } else {
        truncate_chars(text, TITLE_MAX_CHARS)
    }
}

/// Hex SHA-256 of `s`.
pub fn content_hash(s: &str) -> String {
    use std::fmt::Write as _;
    let digest = Sha256::digest(s.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// URL without its query string, or a content hash when the URL is empty.
pub fn dedupe_key(rec: &FeedRecord) -> String {
    if rec.url.is_empty() {
        content_hash(&format!("{}|{}", rec.title, rec.text))
    } else {
        rec.url.split('?').next().unwrap_or_default().to_string()
    }
}

/// Keep the first record per dedupe key, preserving input order.
/// Returns the survivors and the number of discarded duplicates.
pub fn dedupe(records: Vec<FeedRecord>) -> (Vec<FeedRecord>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut keep = Vec::with_capacity(records.len());
    let mut dropped = 0usize;
    for rec in records {
        if seen.insert(dedupe_key(&rec)) {
            keep.push(rec);
        } else {
            dropped += 1;
        }
    }
    (keep, dropped)
}

/// Linear decay from 1 (just created) to 0 (24h or older), clamped to [0, 1].
pub fn recency_boost(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_ms = now.signed_duration_since(created_at).num_milliseconds() as f64;
    (1.0 - age_ms / DAY_MS).clamp(0.0, 1.0)
}

pub fn apply_recency(records: &mut [FeedRecord], now: DateTime<Utc>) {
    for rec in records.iter_mut() {
        rec.score += recency_boost(rec.created_at, now);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub raw: usize,
    pub kept: usize,
    pub duplicates: usize,
}

/// Dedupe then boost. Output order is not significant; rank afterwards.
pub fn merge_and_boost(now: DateTime<Utc>, raw: Vec<FeedRecord>) -> (Vec<FeedRecord>, MergeStats) {
    let raw_len = raw.len();
    let (mut kept, duplicates) = dedupe(raw);
    apply_recency(&mut kept, now);
    let stats = MergeStats {
        raw: raw_len,
        kept: kept.len(),
        duplicates,
    };
    (kept, stats)
}

#[derive(Debug, Default)]
pub struct Collected {
    pub records: Vec<FeedRecord>,
    pub provider_errors: usize,
}

/// Run every provider in order, one at a time. A failing provider is logged
/// and contributes nothing; its siblings still run.
pub async fn collect(providers: &[Box<dyn SourceProvider>], now: DateTime<Utc>) -> Collected {
    ensure_metrics_described();

    let mut out = Collected::default();
    for p in providers {
        match p.fetch_latest(now).await {
            Ok(mut v) => {
                tracing::debug!(target: "ingest", provider = p.name(), count = v.len(), "provider done");
                counter!("ingest_events_total").increment(v.len() as u64);
                out.records.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
                out.provider_errors += 1;
            }
        }
    }

    gauge!("pipeline_last_run_ts").set(now.timestamp().max(0) as f64);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceKind;
    use chrono::{Duration, TimeZone};

    fn rec(url: &str, title: &str) -> FeedRecord {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
        FeedRecord {
            url: url.into(),
            title: title.into(),
            ..FeedRecord::seeded(SourceKind::Bluesky, now)
        }
    }

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "<a href=\"x\">Packers&nbsp;win</a>&nbsp;&nbsp;<font>ESPN</font>";
        assert_eq!(normalize_text(s), "Packers win ESPN");
    }

    #[test]
    fn key_ignores_query_string() {
        let a = rec("https://x.test/a?utm=1", "one");
        let b = rec("https://x.test/a?utm=2", "two");
        assert_eq!(dedupe_key(&a), dedupe_key(&b));
        assert_eq!(dedupe_key(&a), "https://x.test/a");
    }

    #[test]
    fn key_hashes_content_without_url() {
        let a = rec("", "same");
        let b = rec("", "same");
        let c = rec("", "other");
        assert_eq!(dedupe_key(&a), dedupe_key(&b));
        assert_ne!(dedupe_key(&a), dedupe_key(&c));
        assert_eq!(dedupe_key(&a).len(), 64);
    }

    #[test]
    fn first_seen_wins() {
        let mut better = rec("https://x.test/a?b", "second");
        better.score = 9.0;
        let (kept, dropped) = dedupe(vec![rec("https://x.test/a", "first"), better]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 1);
        assert_eq!(kept[0].title, "first");
    }

    #[test]
    fn recency_is_bounded() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
        assert!((recency_boost(now, now) - 1.0).abs() < 1e-9);
        assert!((recency_boost(now - Duration::hours(12), now) - 0.5).abs() < 1e-9);
        assert_eq!(recency_boost(now - Duration::hours(24), now), 0.0);
        assert_eq!(recency_boost(now - Duration::days(30), now), 0.0);
        assert_eq!(recency_boost(now + Duration::hours(5), now), 1.0);
    }

    #[test]
    fn display_title_falls_back_to_text() {
        assert_eq!(display_title("T", "body"), "T");
        assert_eq!(display_title("", &"x".repeat(300)).chars().count(), 120);
        assert_eq!(display_title("", ""), "");
    }
}
