//! # Endpoint Adapters
//!
//! The three multi-get endpoints differ only in how the request URL is built
//! and how one `data` entry turns into a typed record. [`EndpointAdapter`]
//! captures exactly that; fetching, retrying and error handling are shared in
//! [`GamesApi::fetch`](super::apicall::GamesApi::fetch).
//!
//! Every endpoint answers with `{ "data": [ ... ] }`. Ids missing from `data`
//! simply end up missing from the returned map.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::games::model::{RawGameRecord, ThumbnailRef, UniverseId, VoteRatio};

/// Request shape and response parsing of one multi-get endpoint.
pub trait EndpointAdapter {
    /// One element of the response's `data` array.
    type Entry: DeserializeOwned;
    /// Typed record produced per universe.
    type Output;

    /// Short name used in logs.
    const NAME: &'static str;

    /// Full upstream URL for one batch.
    fn build_url(&self, ids: &[UniverseId]) -> String;

    /// Maps the `data` entries to records keyed by universe id.
    fn parse(&self, entries: Vec<Self::Entry>) -> HashMap<UniverseId, Self::Output>;
}

/// `{ "data": [...] }` wrapper shared by all three endpoints. A missing or
/// `null` `data` is treated as empty.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    /// Per-universe entries.
    pub data: Option<Vec<T>>,
}

impl<T> DataEnvelope<T> {
    /// Entries, empty when upstream sent none.
    pub fn into_entries(self) -> Vec<T> {
        self.data.unwrap_or_default()
    }
}

fn join_ids(ids: &[UniverseId]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// Entry of `GET /v1/games`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEntry {
    /// Universe id.
    pub id: UniverseId,
    /// Start place id.
    #[serde(default)]
    pub root_place_id: Option<u64>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Concurrent players.
    #[serde(default)]
    pub playing: Option<u64>,
    /// Lifetime visits.
    #[serde(default)]
    pub visits: Option<u64>,
}

/// Game metadata adapter.
#[derive(Debug, Clone)]
pub struct MetadataAdapter {
    base: String,
}

impl MetadataAdapter {
    /// `base` is the games API origin, e.g. `https://games.roblox.com`.
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl EndpointAdapter for MetadataAdapter {
    type Entry = GameEntry;
    type Output = RawGameRecord;

    const NAME: &'static str = "games";

    fn build_url(&self, ids: &[UniverseId]) -> String {
        format!("{}/v1/games?universeIds={}", trim_base(&self.base), join_ids(ids))
    }

    fn parse(&self, entries: Vec<GameEntry>) -> HashMap<UniverseId, RawGameRecord> {
        entries
            .into_iter()
            .map(|entry| {
                let record = RawGameRecord {
                    id: entry.id,
                    root_place_id: entry.root_place_id.unwrap_or(0),
                    name: entry.name.unwrap_or_default(),
                    playing: entry.playing.unwrap_or(0),
                    visits: entry.visits.unwrap_or(0),
                };
                (entry.id, record)
            })
            .collect()
    }
}

/// Entry of `GET /v1/games/votes`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteEntry {
    /// Universe id.
    pub id: UniverseId,
    /// Up votes.
    #[serde(default)]
    pub up_votes: Option<u64>,
    /// Down votes.
    #[serde(default)]
    pub down_votes: Option<u64>,
}

/// Vote ratio adapter. Unrated universes map to ratio 0 rather than being
/// left out.
#[derive(Debug, Clone)]
pub struct VotesAdapter {
    base: String,
}

impl VotesAdapter {
    /// `base` is the games API origin.
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl EndpointAdapter for VotesAdapter {
    type Entry = VoteEntry;
    type Output = VoteRatio;

    const NAME: &'static str = "votes";

    fn build_url(&self, ids: &[UniverseId]) -> String {
        format!("{}/v1/games/votes?universeIds={}", trim_base(&self.base), join_ids(ids))
    }

    fn parse(&self, entries: Vec<VoteEntry>) -> HashMap<UniverseId, VoteRatio> {
        entries
            .into_iter()
            .map(|entry| {
                let ratio = VoteRatio::from_votes(
                    entry.id,
                    entry.up_votes.unwrap_or(0),
                    entry.down_votes.unwrap_or(0),
                );
                (entry.id, ratio)
            })
            .collect()
    }
}

/// Entry of `GET /v1/games/multiget/thumbnails`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailEntry {
    /// Universe id.
    #[serde(default)]
    pub universe_id: Option<UniverseId>,
    /// Older responses carry the id here instead.
    #[serde(default)]
    pub target_id: Option<UniverseId>,
    /// Rendered images, first one wins.
    #[serde(default)]
    pub thumbnails: Option<Vec<ThumbnailImage>>,
}

/// One rendered thumbnail.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailImage {
    /// Image location; absent while rendering is pending or blocked.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Thumbnail adapter. Universes without an image map to an empty URL.
#[derive(Debug, Clone)]
pub struct ThumbnailsAdapter {
    base: String,
    size: String,
}

impl ThumbnailsAdapter {
    /// `base` is the thumbnails API origin, `size` e.g. `768x432`.
    pub fn new(base: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            size: size.into(),
        }
    }
}

impl EndpointAdapter for ThumbnailsAdapter {
    type Entry = ThumbnailEntry;
    type Output = ThumbnailRef;

    const NAME: &'static str = "thumbnails";

    fn build_url(&self, ids: &[UniverseId]) -> String {
        format!(
            "{}/v1/games/multiget/thumbnails?universeIds={}&size={}&format=Png&isCircular=false",
            trim_base(&self.base),
            join_ids(ids),
            self.size
        )
    }

    fn parse(&self, entries: Vec<ThumbnailEntry>) -> HashMap<UniverseId, ThumbnailRef> {
        entries
            .into_iter()
            .filter_map(|entry| {
                let id = entry.universe_id.or(entry.target_id)?;
                let image_url = entry
                    .thumbnails
                    .and_then(|images| images.into_iter().next())
                    .and_then(|image| image.image_url)
                    .unwrap_or_default();
                Some((id, ThumbnailRef { id, image_url }))
            })
            .collect()
    }
}
