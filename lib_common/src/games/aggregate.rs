//! # Aggregation
//!
//! Merges the per-endpoint maps into the published [`Snapshot`]. The
//! [`AggregationPolicy`] chosen for the run decides the shape:
//!
//! - `DropMissing`: universes without metadata are left out; the rest are
//!   ranked by concurrent players (stable, so ties keep input order).
//! - `ZeroFillSummary`: every requested universe is kept in input order with
//!   zeroes for missing data, plus totals and a trimmed average rating.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{AggregatedRecord, RawGameRecord, ThumbnailRef, UniverseId, VoteRatio};
use crate::configs::AggregationPolicy;

/// Results of the three endpoints, keyed by universe id.
#[derive(Debug, Default, Clone)]
pub struct SourceMaps {
    /// Game metadata.
    pub games: HashMap<UniverseId, RawGameRecord>,
    /// Like ratios.
    pub votes: HashMap<UniverseId, VoteRatio>,
    /// Thumbnails.
    pub thumbnails: HashMap<UniverseId, ThumbnailRef>,
}

impl SourceMaps {
    /// Folds another batch's maps into this one.
    pub fn extend(&mut self, other: SourceMaps) {
        self.games.extend(other.games);
        self.votes.extend(other.votes);
        self.thumbnails.extend(other.thumbnails);
    }
}

/// Everything a run collected, batch by batch.
#[derive(Debug, Default, Clone)]
pub struct RunResults {
    /// Every requested id, in input order.
    pub requested: Vec<UniverseId>,
    /// Ids of batches whose three fetches all succeeded, in input order.
    pub completed: Vec<UniverseId>,
    /// Ids per batch; position `i` of `requested` was fetched in batch
    /// `i / batch_size`.
    pub batch_size: usize,
    /// Batches attempted.
    pub batch_count: usize,
    /// Zero-based indexes of abandoned batches.
    pub failed_batches: Vec<usize>,
    /// Merged data of the completed batches.
    pub maps: SourceMaps,
}

/// Published snapshot, serialized as either `{ "games": [...] }` or the
/// summary object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Snapshot {
    /// Ranked list (`dropMissing`).
    Ranked(RankedSnapshot),
    /// Totals plus every requested game (`zeroFillSummary`).
    Summary(SummarySnapshot),
}

impl Snapshot {
    /// Records in publication order.
    pub fn records(&self) -> &[AggregatedRecord] {
        match self {
            Snapshot::Ranked(ranked) => &ranked.games,
            Snapshot::Summary(summary) => &summary.per_game,
        }
    }

    /// Number of published records.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// `true` when nothing was published.
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// `{ "games": [...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedSnapshot {
    /// Games ranked by concurrent players, highest first.
    pub games: Vec<AggregatedRecord>,
}

/// Summary form of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySnapshot {
    /// When the snapshot was built.
    pub updated_at: DateTime<Utc>,
    /// Sum of concurrent players.
    pub total_players: u64,
    /// Sum of lifetime visits.
    pub total_visits: u64,
    /// Trimmed average like ratio, see [`trimmed_average_rating`].
    pub average_rating: u8,
    /// Number of games listed.
    pub games_created: usize,
    /// Every requested game, in input order.
    pub per_game: Vec<AggregatedRecord>,
}

/// # Aggregator
///
/// Applies one [`AggregationPolicy`] for the whole run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    policy: AggregationPolicy,
}

impl Aggregator {
    /// Creates an aggregator bound to `policy`.
    pub fn new(policy: AggregationPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use.
    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Builds the snapshot for `identifiers` from the merged maps.
    pub fn aggregate(
        &self,
        identifiers: &[UniverseId],
        maps: &SourceMaps,
        now: DateTime<Utc>,
    ) -> Snapshot {
        match self.policy {
            AggregationPolicy::DropMissing => Snapshot::Ranked(rank_known(identifiers, maps)),
            AggregationPolicy::ZeroFillSummary => {
                Snapshot::Summary(summarize_all(identifiers, maps, now))
            }
        }
    }

    /// Builds the snapshot of a whole run. Drop-missing only considers
    /// completed batches; zero-fill keeps every requested id, and ids of
    /// abandoned batches stay zeroed even when the same id was fetched in
    /// another batch.
    pub fn aggregate_run(&self, results: &RunResults, now: DateTime<Utc>) -> Snapshot {
        match self.policy {
            AggregationPolicy::DropMissing => {
                Snapshot::Ranked(rank_known(&results.completed, &results.maps))
            }
            AggregationPolicy::ZeroFillSummary => {
                let failed: HashSet<usize> = results.failed_batches.iter().copied().collect();
                let batch_size = results.batch_size.max(1);
                let entries = results
                    .requested
                    .iter()
                    .enumerate()
                    .map(|(position, id)| (*id, !failed.contains(&(position / batch_size))));
                Snapshot::Summary(summarize(entries, &results.maps, now))
            }
        }
    }
}

fn merge_record(
    id: UniverseId,
    game: Option<&RawGameRecord>,
    maps: &SourceMaps,
) -> AggregatedRecord {
    AggregatedRecord {
        id,
        root_place_id: game.map_or(0, |g| g.root_place_id),
        name: game.map(|g| g.name.clone()).unwrap_or_default(),
        playing: game.map_or(0, |g| g.playing),
        visits: game.map_or(0, |g| g.visits),
        like_ratio: maps.votes.get(&id).map_or(0, |v| v.like_ratio),
        icon: maps
            .thumbnails
            .get(&id)
            .map(|t| t.image_url.clone())
            .unwrap_or_default(),
    }
}

fn rank_known(identifiers: &[UniverseId], maps: &SourceMaps) -> RankedSnapshot {
    let mut games: Vec<AggregatedRecord> = identifiers
        .iter()
        .filter_map(|id| {
            maps.games
                .get(id)
                .map(|game| merge_record(*id, Some(game), maps))
        })
        .collect();

    // sort_by is stable
    games.sort_by(|a, b| b.playing.cmp(&a.playing));
    RankedSnapshot { games }
}

fn summarize_all(
    identifiers: &[UniverseId],
    maps: &SourceMaps,
    now: DateTime<Utc>,
) -> SummarySnapshot {
    summarize(identifiers.iter().map(|id| (*id, true)), maps, now)
}

/// `entries` pairs each id with whether its batch delivered data; ids without
/// data are zero-filled and left out of the rating.
fn summarize<I>(entries: I, maps: &SourceMaps, now: DateTime<Utc>) -> SummarySnapshot
where
    I: IntoIterator<Item = (UniverseId, bool)>,
{
    let empty = SourceMaps::default();
    let mut per_game = Vec::new();
    let mut rated = Vec::new();

    for (id, fetched) in entries {
        let source = if fetched { maps } else { &empty };
        per_game.push(merge_record(id, source.games.get(&id), source));
        if let Some(vote) = source.votes.get(&id) {
            rated.push(*vote);
        }
    }

    SummarySnapshot {
        updated_at: now,
        total_players: per_game.iter().map(|g| g.playing).sum(),
        total_visits: per_game.iter().map(|g| g.visits).sum(),
        average_rating: trimmed_average_rating(&rated),
        games_created: per_game.len(),
        per_game,
    }
}

/// Average like ratio over universes that have votes, after discarding the
/// single lowest ratio, rounded half up.
///
/// With one rated universe its ratio is returned as is; with none, 0.
pub fn trimmed_average_rating<'a, I>(votes: I) -> u8
where
    I: IntoIterator<Item = &'a VoteRatio>,
{
    let mut ratios: Vec<u64> = votes
        .into_iter()
        .filter(|v| v.total_votes > 0)
        .map(|v| u64::from(v.like_ratio))
        .collect();

    match ratios.len() {
        0 => 0,
        1 => ratios[0] as u8,
        _ => {
            ratios.sort_unstable();
            let kept = &ratios[1..];
            let count = kept.len() as u64;
            let sum: u64 = kept.iter().sum();
            ((2 * sum + count) / (2 * count)) as u8
        }
    }
}
