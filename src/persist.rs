// src/persist.rs
//! Fail-safe persistence.
//!
//! A run either commits its freshly ranked feed (`CommitNew`) or, when it
//! produced nothing, re-commits the last good snapshot untouched
//! (`PreservePrevious`). A total outage of every source therefore never
//! wipes what the page already shows. The scoreboard has no such fallback.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

use crate::digest::build_digest;
use crate::ingest::types::{FeedRecord, FeedSnapshot};
use crate::scores::GameSnapshot;

pub const FEED_FILE: &str = "data.json";
pub const DIGEST_FILE: &str = "digest.html";
pub const SCORES_FILE: &str = "scores.json";

#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Make the store writable (e.g. create the output directory).
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }
    /// Last committed feed snapshot, if any.
    async fn read_feed(&self) -> Result<Option<FeedSnapshot>>;
    async fn write_feed(&self, snapshot: &FeedSnapshot, digest_html: &str) -> Result<()>;
    async fn write_games(&self, snapshot: &GameSnapshot) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistDecision {
    CommitNew(FeedSnapshot),
    PreservePrevious(FeedSnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PersistOutcome {
    CommitNew,
    PreservePrevious,
}

impl PersistDecision {
    pub fn snapshot(&self) -> &FeedSnapshot {
        match self {
            PersistDecision::CommitNew(s) | PersistDecision::PreservePrevious(s) => s,
        }
    }

    pub fn outcome(&self) -> PersistOutcome {
        match self {
            PersistDecision::CommitNew(_) => PersistOutcome::CommitNew,
            PersistDecision::PreservePrevious(_) => PersistOutcome::PreservePrevious,
        }
    }
}

/// Pick what to commit for this run.
///
/// - non-empty `ranked` → fresh snapshot stamped `run_at`
/// - empty `ranked`, non-empty `prior` → `prior` verbatim
/// - otherwise → empty snapshot (first run ever)
pub fn decide(
    run_at: DateTime<Utc>,
    ranked: Vec<FeedRecord>,
    prior: Option<FeedSnapshot>,
) -> PersistDecision {
    if !ranked.is_empty() {
        return PersistDecision::CommitNew(FeedSnapshot {
            generated_at: run_at,
            items: ranked,
        });
    }
    match prior {
        Some(prev) if !prev.items.is_empty() => PersistDecision::PreservePrevious(prev),
        _ => PersistDecision::CommitNew(FeedSnapshot {
            generated_at: run_at,
            items: Vec::new(),
        }),
    }
}

/// Write the chosen snapshot plus a digest rebuilt from its items.
pub async fn commit<S: SnapshotStore + ?Sized>(
    store: &S,
    decision: &PersistDecision,
    topic: &str,
) -> Result<PersistOutcome> {
    let snapshot = decision.snapshot();
    let digest = build_digest(&snapshot.items, topic);
    store
        .write_feed(snapshot, &digest)
        .await
        .context("committing feed snapshot")?;

    let outcome = decision.outcome();
    match outcome {
        PersistOutcome::CommitNew => counter!("persist_committed_total").increment(1),
        PersistOutcome::PreservePrevious => counter!("persist_preserved_total").increment(1),
    }
    Ok(outcome)
}

// ------------------------------------------------------------
// File store
// ------------------------------------------------------------

/// Writes `data.json`, `digest.html` and `scores.json` into one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn feed_path(&self) -> PathBuf {
        self.dir.join(FEED_FILE)
    }

    pub fn digest_path(&self) -> PathBuf {
        self.dir.join(DIGEST_FILE)
    }

    pub fn scores_path(&self) -> PathBuf {
        self.dir.join(SCORES_FILE)
    }
}

/// Write via a sibling temp file and rename, so readers never see a torn file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = stage(path, bytes).await?;
    promote(&tmp, path).await
}

async fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    Ok(tmp)
}

async fn promote(tmp: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp, path)
        .await
        .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))
}

#[async_trait::async_trait]
impl SnapshotStore for FileStore {
    async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating output dir {}", self.dir.display()))
    }

    async fn read_feed(&self) -> Result<Option<FeedSnapshot>> {
        let path = self.feed_path();
        let raw = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        match serde_json::from_str::<FeedSnapshot>(&raw) {
            Ok(s) => Ok(Some(s)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "prior snapshot unreadable, treating as absent");
                Ok(None)
            }
        }
    }

    async fn write_feed(&self, snapshot: &FeedSnapshot, digest_html: &str) -> Result<()> {
        // Both files are staged before either is renamed, so a failed write
        // leaves the previous snapshot/digest pair in place.
        let json = serde_json::to_vec_pretty(snapshot).context("serializing feed snapshot")?;
        let feed_tmp = stage(&self.feed_path(), &json).await?;
        let digest_tmp = match stage(&self.digest_path(), digest_html.as_bytes()).await {
            Ok(t) => t,
            Err(e) => {
                let _ = fs::remove_file(&feed_tmp).await;
                return Err(e);
            }
        };
        promote(&feed_tmp, &self.feed_path()).await?;
        promote(&digest_tmp, &self.digest_path()).await
    }

    async fn write_games(&self, snapshot: &GameSnapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot).context("serializing game snapshot")?;
        write_atomic(&self.scores_path(), &json).await
    }
}

// --- Test helper ---

/// In-memory store; records every write.
#[derive(Default)]
pub struct MemoryStore {
    pub feed: Mutex<Option<FeedSnapshot>>,
    pub digest: Mutex<Option<String>>,
    pub games: Mutex<Option<GameSnapshot>>,
    pub feed_writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(snapshot: FeedSnapshot) -> Self {
        let store = Self::default();
        *lock(&store.feed) = Some(snapshot);
        store
    }

    pub fn feed(&self) -> Option<FeedSnapshot> {
        lock(&self.feed).clone()
    }

    pub fn digest(&self) -> Option<String> {
        lock(&self.digest).clone()
    }

    pub fn games(&self) -> Option<GameSnapshot> {
        lock(&self.games).clone()
    }

    pub fn feed_writes(&self) -> usize {
        *lock(&self.feed_writes)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryStore {
    async fn read_feed(&self) -> Result<Option<FeedSnapshot>> {
        Ok(self.feed())
    }

    async fn write_feed(&self, snapshot: &FeedSnapshot, digest_html: &str) -> Result<()> {
        *lock(&self.feed) = Some(snapshot.clone());
        *lock(&self.digest) = Some(digest_html.to_string());
        *lock(&self.feed_writes) += 1;
        Ok(())
    }

    async fn write_games(&self, snapshot: &GameSnapshot) -> Result<()> {
        *lock(&self.games) = Some(snapshot.clone());
        Ok(())
    }
}
