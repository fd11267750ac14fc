//! # Games API Client
//!
//! Runs the endpoint adapters over one shared [`ApiClient`]. All three
//! endpoints go through the same retry middleware and the same optional relay.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::adapters::{
    DataEnvelope, EndpointAdapter, MetadataAdapter, ThumbnailsAdapter, VotesAdapter,
};
use crate::configs::PipelineConfig;
use crate::games::model::{RawGameRecord, ThumbnailRef, UniverseId, VoteRatio};
use crate::retrieve::{ApiClient, ApiClientOptions, BackoffPolicy, FetchError, Relay};

/// # Games API
///
/// One client plus the three adapters built from the same configuration.
pub struct GamesApi {
    client: ApiClient,
    metadata: MetadataAdapter,
    votes: VotesAdapter,
    thumbnails: ThumbnailsAdapter,
}

impl GamesApi {
    /// Wires the adapters to an existing client.
    pub fn new(client: ApiClient, config: &PipelineConfig) -> Self {
        Self {
            client,
            metadata: MetadataAdapter::new(config.games_api_base.clone()),
            votes: VotesAdapter::new(config.games_api_base.clone()),
            thumbnails: ThumbnailsAdapter::new(
                config.thumbnails_api_base.clone(),
                config.thumbnail_size.clone(),
            ),
        }
    }

    /// Builds the client (timeouts, backoff, relay) and the adapters from `config`.
    ///
    /// # Errors
    /// Returns [`FetchError::Build`] if the HTTP client cannot be created.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, FetchError> {
        let relay = config
            .relay_url
            .as_deref()
            .filter(|prefix| !prefix.is_empty())
            .map(Relay::new);

        let client = ApiClient::new(ApiClientOptions {
            max_attempts: config.max_attempts,
            attempt_timeout: config.request_timeout(),
            backoff: BackoffPolicy::new(config.backoff_initial(), config.backoff_cap()),
            relay,
        })?;

        Ok(Self::new(client, config))
    }

    /// Fetches one batch through `adapter`.
    ///
    /// A non-retryable error status (a 4xx other than 429) only costs this
    /// adapter its data for the batch: it is logged and an empty map comes back.
    ///
    /// # Errors
    /// Propagates [`FetchError`] once retries are exhausted or the body does not
    /// decode.
    pub async fn fetch<A: EndpointAdapter>(
        &self,
        adapter: &A,
        ids: &[UniverseId],
    ) -> Result<HashMap<UniverseId, A::Output>, FetchError> {
        let url = adapter.build_url(ids);
        let response = self
            .client
            .fetch_with_retry::<DataEnvelope<A::Entry>>(&url)
            .await?;

        if !response.success {
            warn!(
                endpoint = A::NAME,
                status = response.status,
                ids = ?ids,
                body = response.error_body.as_deref().unwrap_or(""),
                "non-retryable status, dropping endpoint data for batch"
            );
            return Ok(HashMap::new());
        }

        let entries = response
            .data
            .map(DataEnvelope::into_entries)
            .unwrap_or_default();
        let parsed = adapter.parse(entries);
        debug!(
            endpoint = A::NAME,
            requested = ids.len(),
            received = parsed.len(),
            "batch fetched"
        );
        Ok(parsed)
    }

    /// Game metadata for a batch.
    pub async fn fetch_games(
        &self,
        ids: &[UniverseId],
    ) -> Result<HashMap<UniverseId, RawGameRecord>, FetchError> {
        self.fetch(&self.metadata, ids).await
    }

    /// Like ratios for a batch.
    pub async fn fetch_votes(
        &self,
        ids: &[UniverseId],
    ) -> Result<HashMap<UniverseId, VoteRatio>, FetchError> {
        self.fetch(&self.votes, ids).await
    }

    /// Thumbnail URLs for a batch.
    pub async fn fetch_thumbnails(
        &self,
        ids: &[UniverseId],
    ) -> Result<HashMap<UniverseId, ThumbnailRef>, FetchError> {
        self.fetch(&self.thumbnails, ids).await
    }
}
