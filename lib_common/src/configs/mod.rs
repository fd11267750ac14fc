//! # Configuration Modules
//!
//! Configuration for the snapshot pipeline: built-in defaults with optional
//! JSON5 file overrides.

/// Pipeline configuration, JSON5 loading and validation.
pub mod config_pipeline;

pub use config_pipeline::{load_config, AggregationPolicy, ConfigError, PipelineConfig};
