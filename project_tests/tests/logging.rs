use std::fs;

use lib_common::loggers::{LoggerLocal, LoggerLocalOptions};
use tempfile::tempdir;
use tracing::{info, warn};

// Installing the global subscriber can only happen once per process, so this
// file holds a single test.
#[test]
fn json_file_layer_records_events_and_rotates_old_files() -> anyhow::Result<()> {
    let dir = tempdir()?;
    for stamp in ["20240101_000000", "20240102_000000", "20240103_000000"] {
        fs::write(dir.path().join(format!("test_app-{stamp}.log")), "old")?;
    }
    fs::write(dir.path().join("other_app-20240101_000000.log"), "keep")?;

    let logger = LoggerLocal::init(
        "test_app",
        LoggerLocalOptions {
            use_tty: false,
            use_file: true,
            log_dir: dir.path().to_path_buf(),
            level: "info".into(),
            keep_files: 1,
        },
    )?;
    let log_file = logger.current_log_file().expect("file logging on").to_path_buf();

    info!(batch = 3, "batch complete");
    warn!(status = 503, "retryable status");

    // flushes the non-blocking writer
    drop(logger);

    let contents = fs::read_to_string(&log_file)?;
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    let by_message = |message: &str| {
        events
            .iter()
            .find(|e| e["fields"]["message"] == message)
            .cloned()
            .unwrap_or_default()
    };
    let complete = by_message("batch complete");
    assert_eq!(complete["level"], "INFO");
    assert_eq!(complete["fields"]["batch"], 3);
    assert_eq!(by_message("retryable status")["fields"]["status"], 503);

    let mut remaining: Vec<String> = fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    let current = log_file.file_name().unwrap().to_string_lossy().into_owned();
    let mut expected = vec![
        "other_app-20240101_000000.log".to_string(),
        "test_app-20240103_000000.log".to_string(),
        current,
    ];
    expected.sort();
    assert_eq!(remaining, expected);
    Ok(())
}
