//! File-based persistence for the probe/monitor hand-off.
//!
//! The layout inside the output directory is:
//!  - `user_data_<timestamp>.json` — one observation snapshot per capture
//!    tick, retained indefinitely. Timestamps are zero padded
//!    ([crate::utils::time::TIMESTAMP_FORMAT]), so sorting filenames sorts
//!    snapshots chronologically.
//!  - `live_output.json` — the latest observation, overwritten each tick.
//!  - `prediction_output.json` — the latest verdict, overwritten on each
//!    classification.
//!  - `hover_output.json` — a growing array of interaction records.
//!
//! Single-slot files are written to a temporary name and renamed into place,
//! so a concurrent reader never sees a half-written slot. Reads still treat
//! malformed JSON the same as a missing file ("no data yet") since the files
//! sit in a user-visible directory and anything may have touched them.

pub mod entities;

use std::path::{Path, PathBuf};

use anyhow::Result;
use entities::{HoverRecord, Observation, Verdict};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

pub const LIVE_OBSERVATION_FILE: &str = "live_output.json";
pub const LIVE_VERDICT_FILE: &str = "prediction_output.json";
pub const HOVER_LOG_FILE: &str = "hover_output.json";
const SNAPSHOT_PREFIX: &str = "user_data_";

/// Owns the output directory and every read/write against it.
pub struct ActivityStore {
    output_dir: PathBuf,
}

impl ActivityStore {
    pub fn new(output_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn snapshot_name(timestamp: &str) -> String {
        format!("{SNAPSHOT_PREFIX}{timestamp}.json")
    }

    /// Writes the per-tick snapshot and then moves the latest pointer.
    pub async fn write_observation(&self, observation: &Observation) -> Result<()> {
        let body = serde_json::to_vec_pretty(observation)?;
        let snapshot = self
            .output_dir
            .join(Self::snapshot_name(&observation.timestamp));
        fs::write(&snapshot, &body).await?;
        self.replace_slot(LIVE_OBSERVATION_FILE, &body).await?;
        debug!("Wrote observation snapshot {snapshot:?}");
        Ok(())
    }

    /// Latest observation, or None when the slot is missing or unreadable.
    pub async fn read_latest_observation(&self) -> Option<Observation> {
        self.read_json(&self.output_dir.join(LIVE_OBSERVATION_FILE))
            .await
    }

    /// A named snapshot from the output directory.
    pub async fn read_observation(&self, name: &str) -> Option<Observation> {
        self.read_json(&self.output_dir.join(name)).await
    }

    /// All snapshot filenames in ascending (chronological) order.
    pub async fn snapshot_files(&self) -> Result<Vec<String>> {
        let mut names = vec![];
        let mut entries = match fs::read_dir(&self.output_dir).await {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// The last `count` snapshots, still ascending. Fewer files than asked
    /// for returns everything available.
    pub async fn recent_snapshots(&self, count: usize) -> Result<Vec<String>> {
        let mut names = self.snapshot_files().await?;
        if names.len() > count {
            names.drain(..names.len() - count);
        }
        Ok(names)
    }

    pub async fn write_verdict(&self, verdict: &Verdict) -> Result<()> {
        let body = serde_json::to_vec_pretty(verdict)?;
        self.replace_slot(LIVE_VERDICT_FILE, &body).await
    }

    pub async fn read_verdict(&self) -> Option<Verdict> {
        self.read_json(&self.output_dir.join(LIVE_VERDICT_FILE))
            .await
    }

    /// Appends one record to the interaction log array. A malformed existing
    /// log is restarted rather than failing the append.
    pub async fn append_hover_record(&self, record: HoverRecord) -> Result<()> {
        let path = self.output_dir.join(HOVER_LOG_FILE);
        let mut records: Vec<HoverRecord> = self.read_json(&path).await.unwrap_or_default();
        records.push(record);
        let body = serde_json::to_vec_pretty(&records)?;
        self.replace_slot(HOVER_LOG_FILE, &body).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let content = match fs::read(path).await {
            Ok(v) => v,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed reading {path:?}: {e}");
                }
                return None;
            }
        };
        match serde_json::from_slice(&content) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring malformed json in {path:?}: {e}");
                None
            }
        }
    }

    /// Write-then-rename so readers of the slot never observe a partial file.
    async fn replace_slot(&self, name: &str, body: &[u8]) -> Result<()> {
        let target = self.output_dir.join(name);
        let staging = self.output_dir.join(format!(".{name}.tmp"));
        let mut file = fs::File::create(&staging).await?;
        file.write_all(body).await?;
        file.flush().await?;
        drop(file);
        fs::rename(&staging, &target).await?;
        Ok(())
    }
}

#[cfg(test)]
mod store_tests {
    use tempfile::tempdir;

    use super::*;
    use crate::utils::logging::TEST_LOGGING;

    fn observation(timestamp: &str) -> Observation {
        Observation {
            timestamp: timestamp.into(),
            active_window: "alacritty".into(),
            focused_text: "cargo test".into(),
            clipboard: "let x = 1;".into(),
            ocr_text: "running 3 tests".into(),
        }
    }

    #[tokio::test]
    async fn observation_round_trips_through_snapshot() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;
        let original = observation("2025-03-15_10-00-00");

        store.write_observation(&original).await?;

        let from_snapshot = store
            .read_observation(&ActivityStore::snapshot_name("2025-03-15_10-00-00"))
            .await
            .unwrap();
        let from_slot = store.read_latest_observation().await.unwrap();
        assert_eq!(from_snapshot, original);
        assert_eq!(from_slot, original);
        Ok(())
    }

    #[tokio::test]
    async fn missing_and_malformed_slots_read_as_none() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;

        assert!(store.read_latest_observation().await.is_none());

        fs::write(dir.path().join(LIVE_OBSERVATION_FILE), b"{\"timest").await?;
        assert!(store.read_latest_observation().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn recent_snapshots_returns_ascending_tail() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;
        for slug in [
            "2025-03-15_10-00-00",
            "2025-03-15_09-00-00",
            "2025-03-15_11-00-00",
        ] {
            store.write_observation(&observation(slug)).await?;
        }

        let recent = store.recent_snapshots(2).await?;
        assert_eq!(
            recent,
            vec![
                ActivityStore::snapshot_name("2025-03-15_10-00-00"),
                ActivityStore::snapshot_name("2025-03-15_11-00-00"),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn recent_snapshots_with_fewer_files_than_asked() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;
        store
            .write_observation(&observation("2025-03-15_10-00-00"))
            .await?;

        let recent = store.recent_snapshots(5).await?;
        assert_eq!(
            recent,
            vec![ActivityStore::snapshot_name("2025-03-15_10-00-00")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_listing_skips_slot_files() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;
        store
            .write_observation(&observation("2025-03-15_10-00-00"))
            .await?;
        store
            .write_verdict(&Verdict::unknown("No user data available"))
            .await?;

        let names = store.snapshot_files().await?;
        assert_eq!(
            names,
            vec![ActivityStore::snapshot_name("2025-03-15_10-00-00")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn hover_log_grows_and_survives_corruption() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;
        let record = |text: &str| HoverRecord {
            timestamp: "2025-03-15 10:00:00".into(),
            active_window: "firefox".into(),
            foctext: text.into(),
        };

        store.append_hover_record(record("first")).await?;
        store.append_hover_record(record("second")).await?;
        let content = fs::read(dir.path().join(HOVER_LOG_FILE)).await?;
        let records: Vec<HoverRecord> = serde_json::from_slice(&content)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].foctext, "second");

        fs::write(dir.path().join(HOVER_LOG_FILE), b"not json").await?;
        store.append_hover_record(record("third")).await?;
        let content = fs::read(dir.path().join(HOVER_LOG_FILE)).await?;
        let records: Vec<HoverRecord> = serde_json::from_slice(&content)?;
        assert_eq!(records.len(), 1);
        Ok(())
    }
}
