// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod digest;
pub mod ingest;
pub mod telemetry;
pub mod persist;
pub mod pipeline;
pub mod rank;
pub mod scores;

// ---- Re-exports for stable public API ----
pub use crate::config::PulseConfig;
pub use crate::ingest::types::{FeedRecord, FeedSnapshot, SourceKind, SourceProvider};
pub use crate::persist::{FileStore, PersistDecision, PersistOutcome, SnapshotStore};
pub use crate::pipeline::{run_all, RunReport};
pub use crate::scores::{GameRecord, GameSnapshot};
