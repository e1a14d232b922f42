// src/ingest/timestamp.rs
//! Tolerant timestamp parsing shared by every adapter.
//!
//! Upstream APIs disagree on formats (RFC 3339 on Bluesky/ESPN, RFC 2822 in
//! RSS `pubDate`, epoch seconds on Reddit). Anything that does not parse is
//! replaced by the run time, so a record's `created_at` is always valid.

use chrono::{DateTime, NaiveDateTime, Utc};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// Parse `raw` as RFC 3339, RFC 2822 or a naive ISO date-time (assumed UTC).
/// Missing, blank or unparseable input yields `now`.
pub fn parse_timestamp_or(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(parse_any)
        .unwrap_or(now)
}

/// Epoch seconds (possibly fractional) to UTC, falling back to `now`.
pub fn from_unix_secs_or(secs: Option<f64>, now: DateTime<Utc>) -> DateTime<Utc> {
    secs.filter(|s| s.is_finite())
        .and_then(|s| {
            let whole = s.trunc() as i64;
            let nanos = ((s - s.trunc()) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
            DateTime::from_timestamp(whole, nanos)
        })
        .unwrap_or(now)
}

fn parse_any(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_rfc2822(s) {
        return Some(dt);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%MZ", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn parse_rfc2822(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond());
    }
    // obsolete zone names ("GMT", "EST") are common in RSS
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn rfc3339_and_rfc2822_parse() {
        let a = parse_timestamp_or(Some("2025-09-06T09:30:00.000Z"), now());
        assert_eq!(a, Utc.with_ymd_and_hms(2025, 9, 6, 9, 30, 0).unwrap());

        let b = parse_timestamp_or(Some("Sat, 06 Sep 2025 09:30:00 GMT"), now());
        assert_eq!(b, Utc.with_ymd_and_hms(2025, 9, 6, 9, 30, 0).unwrap());

        let c = parse_timestamp_or(Some("Sat, 06 Sep 2025 11:30:00 +0200"), now());
        assert_eq!(c, Utc.with_ymd_and_hms(2025, 9, 6, 9, 30, 0).unwrap());
    }

    #[test]
    fn espn_minute_precision_parses() {
        let t = parse_timestamp_or(Some("2025-09-07T20:25Z"), now());
        assert_eq!(t, Utc.with_ymd_and_hms(2025, 9, 7, 20, 25, 0).unwrap());
    }

    #[test]
    fn garbage_and_missing_fall_back_to_now() {
        assert_eq!(parse_timestamp_or(None, now()), now());
        assert_eq!(parse_timestamp_or(Some("   "), now()), now());
        assert_eq!(parse_timestamp_or(Some("yesterday-ish"), now()), now());
    }

    #[test]
    fn unix_seconds() {
        let t = from_unix_secs_or(Some(1_757_152_800.0), now());
        assert_eq!(t, Utc.with_ymd_and_hms(2025, 9, 6, 10, 0, 0).unwrap());
        assert_eq!(from_unix_secs_or(Some(f64::NAN), now()), now());
        assert_eq!(from_unix_secs_or(None, now()), now());
    }
}
