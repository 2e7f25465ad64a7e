use crate::write_atomic;
use chrono::{DateTime, TimeZone, Utc};
use redditfeed_core::{epoch_seconds, SeenSet, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk shape of the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Oldest first.
    #[serde(default)]
    pub seen_fullnames: Vec<String>,
    /// Epoch seconds of the last completed cycle, 0 if never.
    #[serde(default)]
    pub last_run_utc: f64,
}

/// Seen fullnames and last-run timestamp, persisted as pretty JSON.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    seen: SeenSet,
    last_run_utc: f64,
}

impl StateStore {
    /// Load state from `path`. A missing file is an empty state; an
    /// unparseable one is an error.
    pub async fn load(path: impl Into<PathBuf>, max_seen_keep: usize) -> Result<Self, StorageError> {
        let path = path.into();

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<RunState>(&bytes).map_err(|source| {
                StorageError::CorruptState {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file at {}, starting fresh", path.display());
                RunState::default()
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let seen = SeenSet::from_ordered(state.seen_fullnames, max_seen_keep);
        info!(
            "Loaded state: {} seen fullnames, last run: {}",
            seen.len(),
            describe_last_run(state.last_run_utc)
        );

        Ok(Self {
            path,
            seen,
            last_run_utc: state.last_run_utc,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Add fullnames in arrival order, evicting the oldest past the cap.
    pub fn record_seen<I>(&mut self, fullnames: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.seen.extend(fullnames);
    }

    pub fn last_run_utc(&self) -> f64 {
        self.last_run_utc
    }

    pub fn mark_run(&mut self, at: DateTime<Utc>) {
        self.last_run_utc = epoch_seconds(at);
    }

    pub fn snapshot(&self) -> RunState {
        RunState {
            seen_fullnames: self.seen.iter().cloned().collect(),
            last_run_utc: self.last_run_utc,
        }
    }

    /// Persist via temp file + rename.
    pub async fn save(&self) -> Result<(), StorageError> {
        let mut json = serde_json::to_vec_pretty(&self.snapshot())?;
        json.push(b'\n');
        write_atomic(&self.path, &json).await?;
        debug!("Saved state: {} seen fullnames", self.seen.len());
        Ok(())
    }
}

fn describe_last_run(last_run_utc: f64) -> String {
    if last_run_utc <= 0.0 {
        return "never".to_string();
    }
    Utc.timestamp_millis_opt((last_run_utc * 1000.0) as i64)
        .single()
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| last_run_utc.to_string())
}
