// src/config/pulse.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::fetch::DEFAULT_USER_AGENT;
use crate::ingest::providers::bluesky::SEARCH_ENDPOINT;
use crate::scores::{TeamTarget, SCOREBOARD_URL};

pub const ENV_CONFIG_PATH: &str = "PULSE_CONFIG_PATH";
pub const ENV_OUTPUT_DIR: &str = "PULSE_OUTPUT_DIR";
pub const ENV_INTERVAL_SECS: &str = "PULSE_INTERVAL_SECS";
pub const ENV_METRICS_PATH: &str = "PULSE_METRICS_PATH";

const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Label used in the digest headline, e.g. "Packers".
    pub topic: String,
    pub output_dir: PathBuf,
    /// Prometheus text file written after each run; `None` disables it.
    pub metrics_path: Option<PathBuf>,
    /// Run forever on this interval instead of once.
    pub interval_secs: Option<u64>,
    pub fetch: FetchConfig,
    pub bluesky: BlueskyConfig,
    pub rss: RssConfig,
    pub reddit: RedditConfig,
    pub scoreboard: ScoreboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub retries: u8,
    pub retry_pause_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueskyConfig {
    pub endpoint: String,
    pub queries: Vec<String>,
    pub limit: u32,
    pub pause_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RssConfig {
    pub feeds: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub feeds: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreboardConfig {
    pub url: String,
    pub team_name: String,
    pub team_abbr: String,
    pub timeout_secs: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            topic: "Packers".to_string(),
            output_dir: PathBuf::from("docs"),
            metrics_path: None,
            interval_secs: None,
            fetch: FetchConfig::default(),
            bluesky: BlueskyConfig::default(),
            rss: RssConfig {
                feeds: vec![
                    "https://news.google.com/rss/search?q=Green%20Bay%20Packers&hl=en-US&gl=US&ceid=US:en".into(),
                    "https://news.google.com/rss/search?q=Packers%20trade&hl=en-US&gl=US&ceid=US:en".into(),
                    "https://news.google.com/rss/search?q=Jordan%20Love%20Packers&hl=en-US&gl=US&ceid=US:en".into(),
                ],
            },
            reddit: RedditConfig {
                feeds: vec!["https://www.reddit.com/r/GreenBayPackers/.json?limit=50".into()],
            },
            scoreboard: ScoreboardConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: 2,
            retry_pause_ms: 1_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            endpoint: SEARCH_ENDPOINT.to_string(),
            queries: [
                "Green Bay Packers",
                "Packers trade OR rumor",
                "Jordan Love",
                "Brian Gutekunst",
                "Matt LaFleur",
                "#GoPackGo",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            limit: 20,
            pause_ms: 600,
        }
    }
}

impl Default for ScoreboardConfig {
    fn default() -> Self {
        Self {
            url: SCOREBOARD_URL.to_string(),
            team_name: "Green Bay Packers".to_string(),
            team_abbr: "GB".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }
}

impl ScoreboardConfig {
    pub fn target(&self) -> TeamTarget {
        TeamTarget {
            display_name: self.team_name.clone(),
            abbreviation: self.team_abbr.clone(),
        }
    }
}

impl PulseConfig {
    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Resolve config in order:
    /// 1) $PULSE_CONFIG_PATH (must exist)
    /// 2) config/pulse.toml
    /// 3) config/pulse.json
    /// 4) built-in defaults
    ///
    /// Env overrides are applied last.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/pulse.toml");
            let json_p = PathBuf::from("config/pulse.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var(ENV_OUTPUT_DIR) {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir.trim());
            }
        }
        if let Ok(v) = std::env::var(ENV_INTERVAL_SECS) {
            let secs: u64 = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_INTERVAL_SECS} must be an integer, got {v:?}"))?;
            self.interval_secs = (secs > 0).then_some(secs);
        }
        if let Ok(p) = std::env::var(ENV_METRICS_PATH) {
            self.metrics_path = (!p.trim().is_empty()).then(|| PathBuf::from(p.trim()));
        }
        Ok(())
    }

    /// Drop blank list entries; replace unusable zero values with defaults.
    pub fn sanitize(&mut self) {
        clean_list(&mut self.bluesky.queries);
        clean_list(&mut self.rss.feeds);
        clean_list(&mut self.reddit.feeds);
        if self.fetch.timeout_secs == 0 {
            self.fetch.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        if self.scoreboard.timeout_secs == 0 {
            self.scoreboard.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        if self.fetch.user_agent.trim().is_empty() {
            self.fetch.user_agent = DEFAULT_USER_AGENT.to_string();
        }
        if self.topic.trim().is_empty() {
            self.topic = PulseConfig::default().topic;
        }
        if self.interval_secs == Some(0) {
            self.interval_secs = None;
        }
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PulseConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            if let Ok(v) = serde_json::from_str(s) {
                return Ok(v);
            }
            toml::from_str(s).map_err(|e| anyhow!("unsupported config format: {e}"))
        }
    }
}

fn clean_list(items: &mut Vec<String>) {
    items.iter_mut().for_each(|s| *s = s.trim().to_string());
    items.retain(|s| !s.is_empty());
}
