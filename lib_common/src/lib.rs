//! # lib_common
//!
//! Shared building blocks for the `gamestats` workspace. Every top-level module
//! sits behind a cargo feature of the same name so binaries only pull in what
//! they use (`full` enables everything).
//!
//! - **`configs`**: pipeline configuration with JSON5 file overrides.
//! - **`loggers`**: `tracing` subscriber setup with rotated JSON log files.
//! - **`retrieve`**: resilient HTTP client (timeouts, backoff, `Retry-After`).
//! - **`games`**: the batched game-stats pipeline and snapshot writer.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Pipeline configuration loading and validation.
#[cfg(feature = "configs")]
pub mod configs;

/// Batched game-stats pipeline.
#[cfg(feature = "games")]
pub mod games;

/// Structured logging setup.
#[cfg(feature = "loggers")]
pub mod loggers;

/// Resilient HTTP retrieval.
#[cfg(feature = "retrieve")]
pub mod retrieve;
