//! # Scoreboard
//! Compact live/recent-game summary for one team, read from the ESPN
//! scoreboard. Rebuilt from scratch every run; no cross-run state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ingest::fetch::FetchClient;
use crate::ingest::timestamp::parse_timestamp_or;
use crate::ingest::types::nullable;

pub const SCOREBOARD_URL: &str = "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard";

/// ESPN status state for a game in progress.
pub const LIVE_STATE: &str = "in";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameRecord {
    pub label: String,
    pub live: bool,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSnapshot {
    pub updated_at: DateTime<Utc>,
    pub games: Vec<GameRecord>,
}

/// Team identity a competition must include to be kept.
#[derive(Debug, Clone)]
pub struct TeamTarget {
    pub display_name: String,
    pub abbreviation: String,
}

impl TeamTarget {
    fn matches(&self, team: &Team) -> bool {
        let name = team.display_name.as_deref().unwrap_or_default();
        let abbr = team.abbreviation.as_deref().unwrap_or_default();
        (!name.is_empty() && name == self.display_name)
            || (!abbr.is_empty() && abbr == self.abbreviation)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Scoreboard {
    #[serde(default, deserialize_with = "nullable")]
    events: Vec<Option<Event>>,
}

#[derive(Debug, Default, Deserialize)]
struct Event {
    date: Option<String>,
    status: Option<Status>,
    #[serde(default, deserialize_with = "nullable")]
    competitions: Vec<Option<Competition>>,
}

#[derive(Debug, Default, Deserialize)]
struct Competition {
    date: Option<String>,
    status: Option<Status>,
    #[serde(default, deserialize_with = "nullable")]
    competitors: Vec<Option<Competitor>>,
}

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(rename = "type")]
    kind: Option<StatusType>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusType {
    state: Option<String>,
    #[serde(rename = "shortDetail")]
    short_detail: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Competitor {
    #[serde(rename = "homeAway")]
    home_away: Option<String>,
    // string on the public scoreboard, number on some mirrors
    score: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    team: Team,
}

#[derive(Debug, Default, Deserialize)]
struct Team {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    abbreviation: Option<String>,
}

fn score_str(v: &Option<Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn state_of(s: &Option<Status>) -> Option<&str> {
    s.as_ref()?.kind.as_ref()?.state.as_deref()
}

/// Games involving `target`, unordered.
pub fn map_scoreboard(sb: Scoreboard, target: &TeamTarget, now: DateTime<Utc>) -> Vec<GameRecord> {
    let mut games = Vec::new();
    for ev in sb.events.into_iter().flatten() {
        let Some(comp) = ev.competitions.first().and_then(|c| c.as_ref()) else {
            continue;
        };
        let teams: Vec<&Competitor> = comp.competitors.iter().flatten().collect();
        if !teams.iter().any(|c| target.matches(&c.team)) {
            continue;
        }

        let state = state_of(&comp.status)
            .filter(|s| !s.is_empty())
            .or_else(|| state_of(&ev.status))
            .unwrap_or_default();
        let detail = comp
            .status
            .as_ref()
            .and_then(|s| s.kind.as_ref())
            .and_then(|k| k.short_detail.as_deref())
            .unwrap_or_default();

        let side = |which: &str| -> (String, String) {
            teams
                .iter()
                .find(|c| c.home_away.as_deref() == Some(which))
                .map(|c| {
                    (
                        c.team.abbreviation.clone().unwrap_or_default(),
                        score_str(&c.score),
                    )
                })
                .unwrap_or_else(|| ("?".to_string(), String::new()))
        };
        let (away, away_score) = side("away");
        let (home, home_score) = side("home");

        let mut label = format!("{away} {away_score} @ {home} {home_score}");
        if !detail.is_empty() {
            label.push_str(" • ");
            label.push_str(detail);
        }

        let date_raw = ev
            .date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .or(comp.date.as_deref());
        games.push(GameRecord {
            label,
            live: state == LIVE_STATE,
            date: parse_timestamp_or(date_raw, now),
        });
    }
    games
}

pub fn games_from_json(body: &str, target: &TeamTarget, now: DateTime<Utc>) -> Result<Vec<GameRecord>> {
    let sb: Scoreboard = serde_json::from_str(body).context("parsing scoreboard json")?;
    Ok(map_scoreboard(sb, target, now))
}

/// Fetch and map the scoreboard. Any failure yields an empty list.
pub async fn fetch_games(
    http: &FetchClient,
    url: &str,
    target: &TeamTarget,
    now: DateTime<Utc>,
) -> Vec<GameRecord> {
    match http.get_json::<Scoreboard>(url, &[]).await {
        Ok(sb) => map_scoreboard(sb, target, now),
        Err(e) => {
            tracing::warn!(target: "ingest", error = ?e, "scoreboard unavailable");
            metrics::counter!("ingest_provider_errors_total").increment(1);
            Vec::new()
        }
    }
}
