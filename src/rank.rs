//! # Ranking
//! Ordering rules for the feed and the scoreboard. Both sorts are stable.

use crate::ingest::types::FeedRecord;
use crate::scores::GameRecord;

/// Scoreboard output cap. A live game always sorts into the kept window.
pub const MAX_GAMES: usize = 4;

/// Score descending, newer first on ties. No cap: the snapshot keeps everything.
pub fn rank_feed(mut records: Vec<FeedRecord>) -> Vec<FeedRecord> {
    records.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    records
}

/// Live games first, then newest, truncated to [`MAX_GAMES`].
pub fn rank_games(mut games: Vec<GameRecord>) -> Vec<GameRecord> {
    games.sort_by(|a, b| b.live.cmp(&a.live).then_with(|| b.date.cmp(&a.date)));
    games.truncate(MAX_GAMES);
    games
}
