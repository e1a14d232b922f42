//! # Digest
//! Three-paragraph HTML summary of the ranked feed. Pure; no I/O.

use crate::ingest::display_title;
use crate::ingest::types::FeedRecord;

pub const EMPTY_DIGEST: &str =
    "<p>No new items yet. Check back after the first hourly update.</p>";

const CONSIDERED: usize = 10;
const HIGHLIGHTS: usize = 8;
const GENERIC_HEADLINE: &str = "multiple developing items";
const METHODOLOGY: &str = "This feed merges Bluesky, Google News, and Reddit, removes near-duplicates, and ranks by recency and relevance.";

/// Escape `&`, `<` and `>` for embedding in HTML text.
pub fn escape_html(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

/// `ranked` must already be in rank order; only the top 10 are considered.
pub fn build_digest(ranked: &[FeedRecord], topic: &str) -> String {
    let top = &ranked[..ranked.len().min(CONSIDERED)];
    let Some(first) = top.first() else {
        return EMPTY_DIGEST.to_string();
    };

    let mut headline = display_title(&first.title, &first.text);
    if headline.is_empty() {
        headline = GENERIC_HEADLINE.to_string();
    }

    let bullets = top
        .iter()
        .take(HIGHLIGHTS)
        .map(|it| format!("• {} ({})", escape_html(&display_title(&it.title, &it.text)), it.source))
        .collect::<Vec<_>>()
        .join(" ");

    let p1 = format!(
        "{} buzz in the last day centers on {}.",
        escape_html(topic),
        escape_html(&headline)
    );
    let p2 = format!("Highlights: {bullets}");
    format!("<p>{p1}</p><p>{p2}</p><p>{METHODOLOGY}</p>")
}
