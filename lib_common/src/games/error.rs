use std::path::PathBuf;

use thiserror::Error;

use crate::configs::ConfigError;
use crate::retrieve::FetchError;

/// Failures that abort a pipeline run. Batch-level fetch failures are logged
/// and skipped, so they never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be constructed.
    #[error(transparent)]
    Client(#[from] FetchError),

    /// The snapshot could not be serialized.
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The snapshot could not be written.
    #[error("failed to write snapshot to {path}: {source}")]
    SnapshotIo {
        /// Target snapshot path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The blocking writer task panicked or was cancelled.
    #[error("snapshot writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
