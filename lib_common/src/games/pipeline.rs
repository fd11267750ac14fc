//! # Snapshot Pipeline
//!
//! Drives one full run: partition the ids, fetch every batch from the three
//! endpoints, aggregate what came back and write the snapshot.
//!
//! Batches run one after another with a fixed pause in between. Inside a
//! batch the three endpoints are queried concurrently; if any of them fails
//! for good the whole batch is abandoned and the run moves on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use super::aggregate::{Aggregator, RunResults, Snapshot, SourceMaps};
use super::batch::partition;
use super::error::PipelineError;
use super::model::UniverseId;
use super::roblox::GamesApi;
use super::snapshot::write_snapshot;
use crate::configs::PipelineConfig;

/// Outcome of [`GamesPipeline::run_and_write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Batches attempted.
    pub batches: usize,
    /// Zero-based indexes of abandoned batches.
    pub failed_batches: Vec<usize>,
    /// Records published.
    pub records: usize,
    /// Where the snapshot went.
    pub output_path: PathBuf,
}

/// # Games Pipeline
pub struct GamesPipeline {
    api: GamesApi,
    aggregator: Aggregator,
    batch_size: usize,
    pause: Duration,
}

impl GamesPipeline {
    /// Uses an already wired [`GamesApi`].
    pub fn new(api: GamesApi, config: &PipelineConfig) -> Self {
        Self {
            api,
            aggregator: Aggregator::new(config.aggregation),
            batch_size: config.batch_size,
            pause: config.inter_batch_pause(),
        }
    }

    /// Builds client, adapters and aggregator from `config`.
    ///
    /// # Errors
    /// Invalid configuration or a client that cannot be built.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let api = GamesApi::from_config(config)?;
        Ok(Self::new(api, config))
    }

    /// Fetches every batch. Never fails as a whole: abandoned batches are
    /// logged and listed in [`RunResults::failed_batches`].
    pub async fn collect(&self, ids: &[UniverseId]) -> RunResults {
        let batches = partition(ids, self.batch_size);
        let mut results = RunResults {
            requested: ids.to_vec(),
            batch_size: self.batch_size,
            batch_count: batches.len(),
            ..RunResults::default()
        };

        info!(ids = ids.len(), batches = batches.len(), "starting collection");

        for (index, batch) in batches.iter().enumerate() {
            let fetched = tokio::try_join!(
                self.api.fetch_games(batch),
                self.api.fetch_votes(batch),
                self.api.fetch_thumbnails(batch),
            );

            match fetched {
                Ok((games, votes, thumbnails)) => {
                    info!(
                        batch = index,
                        size = batch.len(),
                        games = games.len(),
                        votes = votes.len(),
                        thumbnails = thumbnails.len(),
                        "batch complete"
                    );
                    results.maps.extend(SourceMaps {
                        games,
                        votes,
                        thumbnails,
                    });
                    results.completed.extend_from_slice(batch);
                }
                Err(e) => {
                    error!(batch = index, ids = ?batch, error = %e, "batch abandoned");
                    results.failed_batches.push(index);
                }
            }

            if !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        results
    }

    /// Collects and aggregates, stamping the snapshot with the current time.
    pub async fn run(&self, ids: &[UniverseId]) -> (Snapshot, RunResults) {
        let results = self.collect(ids).await;
        let snapshot = self.aggregator.aggregate_run(&results, Utc::now());
        (snapshot, results)
    }

    /// Full run ending with the snapshot on disk.
    ///
    /// # Errors
    /// Only writing the snapshot can fail; batch failures are reported in the
    /// returned [`RunReport`].
    pub async fn run_and_write(
        &self,
        ids: &[UniverseId],
        output: &Path,
    ) -> Result<RunReport, PipelineError> {
        let (snapshot, results) = self.run(ids).await;
        let records = snapshot.len();

        let target = output.to_path_buf();
        tokio::task::spawn_blocking(move || write_snapshot(&target, &snapshot)).await??;

        let report = RunReport {
            batches: results.batch_count,
            failed_batches: results.failed_batches,
            records,
            output_path: output.to_path_buf(),
        };

        info!(
            path = %report.output_path.display(),
            records = report.records,
            failed_batches = report.failed_batches.len(),
            policy = %self.aggregator.policy(),
            "snapshot written"
        );
        Ok(report)
    }
}
