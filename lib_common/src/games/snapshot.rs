//! # Snapshot Writer
//!
//! Persists a [`Snapshot`] as pretty-printed JSON. The whole document is
//! rendered in memory, written to a temporary file next to the target and then
//! renamed over it, so readers see either the previous snapshot or the new one.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use super::aggregate::Snapshot;
use super::error::PipelineError;

/// Writes `snapshot` to `path`, creating missing parent directories.
///
/// # Errors
/// [`PipelineError::Serialize`] if rendering fails, [`PipelineError::SnapshotIo`]
/// for any filesystem failure.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), PipelineError> {
    let body = serde_json::to_string_pretty(snapshot)?;

    let io_err = |source: std::io::Error| PipelineError::SnapshotIo {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(io_err)?;

    let mut staged = NamedTempFile::new_in(parent).map_err(io_err)?;
    staged.write_all(body.as_bytes()).map_err(io_err)?;
    staged.as_file().sync_all().map_err(io_err)?;
    staged.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

/// Reads a snapshot back, mostly for verification.
///
/// # Errors
/// Same as [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<Snapshot, PipelineError> {
    let raw = fs::read_to_string(path).map_err(|source| PipelineError::SnapshotIo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::aggregate::RankedSnapshot;
    use crate::games::model::AggregatedRecord;

    fn ranked() -> Snapshot {
        Snapshot::Ranked(RankedSnapshot {
            games: vec![AggregatedRecord {
                id: 1,
                root_place_id: 2,
                name: "Build a Mech".into(),
                playing: 30,
                visits: 400,
                like_ratio: 88,
                icon: "https://img/1.png".into(),
            }],
        })
    }

    #[test]
    fn creates_parents_and_pretty_prints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("public").join("nested").join("games.json");

        write_snapshot(&path, &ranked()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("{\n  \"games\": [\n"));
        assert_eq!(read_snapshot(&path).unwrap(), ranked());
    }

    #[test]
    fn replaces_previous_snapshot_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        let stale = serde_json::json!({"games": [], "stale": true, "padding": "x".repeat(100)});
        fs::write(&path, stale.to_string()).unwrap();

        write_snapshot(&path, &ranked()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("stale"));
        // no staging files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
