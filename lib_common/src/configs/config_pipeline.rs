//! # Pipeline Configuration
//!
//! All tunables of the snapshot pipeline live in [`PipelineConfig`]. The
//! built-in defaults (including the universe id list) are enough to run; an
//! optional JSON5 file can override any subset of keys.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default universe ids fetched when no configuration file overrides them.
pub const DEFAULT_UNIVERSE_IDS: &[u64] = &[
    5991139138,
    7577218041,
    6936093513,
    5374476232,
    13716027142,
    4759813126,
    1680246327,
    4410725758,
    5134533546,
    7429991374,
    7629331599,
    7745789104,
    8118561812,
    8695949193, // Mythic Tower Defense
    8470980958, // Build a Mech
    9098570654, // Apocalypse
];

/// Default relay prefix; the target URL is appended percent-encoded.
pub const DEFAULT_RELAY_URL: &str = "https://rubicon.bloxyhdd.workers.dev/?url=";

#[derive(Debug, Error)]
/// Failures while loading or validating a [`PipelineConfig`].
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON5 or has wrongly typed keys.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How per-source results are merged into the snapshot. One policy per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationPolicy {
    /// Keep only ids with metadata, ranked by concurrent players.
    #[default]
    DropMissing,
    /// Keep every id (zero-filled when data is missing) and add totals.
    ZeroFillSummary,
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationPolicy::DropMissing => write!(f, "dropMissing"),
            AggregationPolicy::ZeroFillSummary => write!(f, "zeroFillSummary"),
        }
    }
}

/// # Pipeline Configuration
///
/// Keys are camelCase in the JSON5 file; any key left out keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Universe ids to fetch, in the order they should be processed.
    pub universe_ids: Vec<u64>,
    /// Ids per multi-get request.
    pub batch_size: usize,
    /// Bound on each HTTP attempt, in milliseconds.
    pub request_timeout_ms: u64,
    /// Attempts per request, the first one included.
    pub max_attempts: u32,
    /// First backoff window, in milliseconds.
    pub backoff_initial_ms: u64,
    /// Backoff ceiling, in milliseconds.
    pub backoff_cap_ms: u64,
    /// Pause after every batch, in milliseconds.
    pub inter_batch_pause_ms: u64,
    /// Relay prefix. `null` calls upstream directly.
    pub relay_url: Option<String>,
    /// Origin of the games and votes endpoints.
    pub games_api_base: String,
    /// Origin of the thumbnails endpoint.
    pub thumbnails_api_base: String,
    /// Requested thumbnail size, e.g. `768x432`.
    pub thumbnail_size: String,
    /// Snapshot file location.
    pub output_path: PathBuf,
    /// Merge policy for this deployment.
    pub aggregation: AggregationPolicy,
    /// Directory for rotated log files.
    pub log_dir: PathBuf,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            universe_ids: DEFAULT_UNIVERSE_IDS.to_vec(),
            batch_size: 75,
            request_timeout_ms: 20_000,
            max_attempts: 4,
            backoff_initial_ms: 250,
            backoff_cap_ms: 4_000,
            inter_batch_pause_ms: 300,
            relay_url: Some(DEFAULT_RELAY_URL.to_string()),
            games_api_base: "https://games.roblox.com".to_string(),
            thumbnails_api_base: "https://thumbnails.roblox.com".to_string(),
            thumbnail_size: "768x432".to_string(),
            output_path: PathBuf::from("public/games.json"),
            aggregation: AggregationPolicy::DropMissing,
            log_dir: PathBuf::from("./logs"),
            log_level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Per-attempt timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// First backoff window.
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    /// Backoff ceiling.
    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    /// Pause inserted after each batch.
    pub fn inter_batch_pause(&self) -> Duration {
        Duration::from_millis(self.inter_batch_pause_ms)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batchSize must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("maxAttempts must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("requestTimeoutMs must be positive".into()));
        }
        if let Some(position) = self.universe_ids.iter().position(|id| *id == 0) {
            return Err(ConfigError::Invalid(format!(
                "universeIds[{position}] must be a positive integer"
            )));
        }
        for (key, base) in [
            ("gamesApiBase", &self.games_api_base),
            ("thumbnailsApiBase", &self.thumbnails_api_base),
        ] {
            url::Url::parse(base)
                .map_err(|e| ConfigError::Invalid(format!("{key} is not a valid URL: {e}")))?;
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("outputPath must not be empty".into()));
        }
        Ok(())
    }
}

/// Loads the configuration, applying the JSON5 file at `path` over the defaults
/// when it exists, then validates the result.
///
/// A `None` path or a missing file yields the defaults.
///
/// # Errors
/// Returns a [`ConfigError`] when the file cannot be read or parsed, or when
/// validation fails.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let config = match path {
        Some(path) if path.is_file() => {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            parse_config(&raw).map_err(|message| ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            })?
        }
        _ => PipelineConfig::default(),
    };

    config.validate()?;
    Ok(config)
}

fn parse_config(raw: &str) -> Result<PipelineConfig, String> {
    json5::from_str::<PipelineConfig>(raw).map_err(|e| e.to_string())
}
