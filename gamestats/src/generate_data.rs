//! Builds `public/games.json` from the configured universe ids.
//!
//! Configuration comes from `generate_data.json5` in the working directory when
//! present (defaults otherwise); `RUST_LOG` overrides the configured log level.
//! Abandoned batches are logged but do not change the exit status.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use lib_common::configs::load_config;
use lib_common::games::GamesPipeline;
use lib_common::loggers::{LoggerLocal, LoggerLocalOptions};

const APP_NAME: &str = "generate_data";
const CONFIG_FILE: &str = "generate_data.json5";

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(Some(Path::new(CONFIG_FILE)))
        .with_context(|| format!("loading {CONFIG_FILE}"))?;

    let _logger = LoggerLocal::init(
        APP_NAME,
        LoggerLocalOptions {
            log_dir: config.log_dir.clone(),
            level: config.log_level.clone(),
            ..LoggerLocalOptions::default()
        },
    )?;

    info!(
        universes = config.universe_ids.len(),
        batch_size = config.batch_size,
        policy = %config.aggregation,
        relay = config.relay_url.as_deref().unwrap_or("none"),
        "generating game stats"
    );

    let pipeline = GamesPipeline::from_config(&config)?;
    let report = pipeline
        .run_and_write(&config.universe_ids, &config.output_path)
        .await
        .context("writing snapshot")?;

    if !report.failed_batches.is_empty() {
        warn!(
            failed = report.failed_batches.len(),
            of = report.batches,
            "some batches were abandoned, snapshot is partial"
        );
    }

    info!(
        records = report.records,
        path = %report.output_path.display(),
        "done"
    );
    Ok(())
}
