//! # Game Stats Module
//!
//! Builds the public game-stats snapshot from Roblox's multi-get endpoints.
//!
//! ## Contained Modules:
//!
//! - **`batch`**: splits the universe id list into request-sized batches.
//! - **`roblox`**: endpoint adapters and the shared resilient fetch.
//! - **`aggregate`**: merges endpoint results under an `AggregationPolicy`.
//! - **`snapshot`**: atomic JSON snapshot writer.
//! - **`pipeline`**: runs batches sequentially and ties everything together.

/// Snapshot aggregation and output shapes.
pub mod aggregate;
/// Id batching.
pub mod batch;
/// Run-level errors.
pub mod error;
/// Records shared between adapters and aggregation.
pub mod model;
/// End-to-end run.
pub mod pipeline;
/// Roblox endpoint clients.
pub mod roblox;
/// Snapshot persistence.
pub mod snapshot;

pub use aggregate::{Aggregator, RunResults, Snapshot, SourceMaps};
pub use error::PipelineError;
pub use model::{AggregatedRecord, UniverseId};
pub use pipeline::{GamesPipeline, RunReport};
pub use snapshot::write_snapshot;
