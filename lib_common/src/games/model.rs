//! Per-game records produced by the endpoint adapters and merged by the
//! aggregator.

use serde::{Deserialize, Serialize};

/// Numeric key of one game ("universe") upstream.
pub type UniverseId = u64;

/// Metadata for one universe as returned by the games endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGameRecord {
    /// Universe id.
    pub id: UniverseId,
    /// Id of the universe's start place.
    pub root_place_id: u64,
    /// Display name.
    pub name: String,
    /// Concurrent players.
    pub playing: u64,
    /// Lifetime visits.
    pub visits: u64,
}

/// Like ratio of one universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteRatio {
    /// Universe id.
    pub id: UniverseId,
    /// Percentage of up votes, 0–100.
    pub like_ratio: u8,
    /// Up plus down votes. Zero means "unrated", not "disliked".
    pub total_votes: u64,
}

impl VoteRatio {
    /// Builds the ratio from raw vote counts.
    pub fn from_votes(id: UniverseId, up_votes: u64, down_votes: u64) -> Self {
        Self {
            id,
            like_ratio: like_ratio(up_votes, down_votes),
            total_votes: up_votes.saturating_add(down_votes),
        }
    }
}

/// `round(up / (up + down) * 100)` with halves rounding up, or 0 without votes.
pub fn like_ratio(up_votes: u64, down_votes: u64) -> u8 {
    let total = u128::from(up_votes) + u128::from(down_votes);
    if total == 0 {
        return 0;
    }
    // floor(x + 0.5) with x = 100 * up / total, in integers.
    let ratio = (200 * u128::from(up_votes) + total) / (2 * total);
    ratio as u8
}

/// Thumbnail of one universe; `image_url` is empty when upstream had none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRef {
    /// Universe id.
    pub id: UniverseId,
    /// Image location, possibly empty.
    pub image_url: String,
}

/// One entry of the published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRecord {
    /// Universe id.
    pub id: UniverseId,
    /// Id of the universe's start place.
    pub root_place_id: u64,
    /// Display name.
    pub name: String,
    /// Concurrent players.
    pub playing: u64,
    /// Lifetime visits.
    pub visits: u64,
    /// Percentage of up votes, 0 when unknown.
    pub like_ratio: u8,
    /// Thumbnail URL, empty when unknown.
    pub icon: String,
}
