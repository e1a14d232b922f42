// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Origin adapter of a feed record. Serialized names are read by the page's source filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Bluesky,
    GoogleNews,
    Reddit,
}

impl SourceKind {
    /// Fixed prior assigned by the adapter before the recency boost.
    pub fn prior(self) -> f64 {
        match self {
            SourceKind::Bluesky => 1.0,
            SourceKind::GoogleNews => 1.2,
            SourceKind::Reddit => 1.1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Bluesky => "Bluesky",
            SourceKind::GoogleNews => "GoogleNews",
            SourceKind::Reddit => "Reddit",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedRecord {
    pub source: SourceKind,
    #[serde(default, deserialize_with = "nullable")]
    pub source_id: String, // traceability only, never a dedupe key
    #[serde(default, deserialize_with = "nullable")]
    pub author: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "nullable")]
    pub score: f64,
}

impl FeedRecord {
    /// Empty record seeded with the source prior.
    pub fn seeded(source: SourceKind, created_at: DateTime<Utc>) -> Self {
        Self {
            source,
            source_id: String::new(),
            author: String::new(),
            title: String::new(),
            text: String::new(),
            url: String::new(),
            created_at,
            score: source.prior(),
        }
    }
}

/// Persisted unit: one run's full ranked feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSnapshot {
    pub generated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<FeedRecord>,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// `now` is the run time; records without a usable timestamp get it.
    async fn fetch_latest(&self, now: DateTime<Utc>) -> Result<Vec<FeedRecord>>;
    fn name(&self) -> &'static str;
}

/// Treat an explicit JSON `null` the same as a missing field.
pub(crate) fn nullable<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Upstream field read as whatever JSON is there: a value of the wrong type
/// becomes `None` instead of failing the whole payload.
#[derive(Debug)]
pub(crate) struct Lenient<T>(pub Option<T>);

impl<T> Default for Lenient<T> {
    fn default() -> Self {
        Lenient(None)
    }
}

impl<T> Lenient<T> {
    pub fn into_inner(self) -> Option<T> {
        self.0
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(Lenient(serde_json::from_value(v).ok()))
    }
}
