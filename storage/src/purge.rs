use crate::write_atomic;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use redditfeed_core::{ComplianceConfig, ErrorExt, StorageError, MAX_PURGE_INTERVAL_HOURS};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const REMOVED_FLAG: &str = "is_deleted_or_removed";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub files_scanned: usize,
    pub files_rewritten: usize,
    pub records_removed: usize,
}

/// Drops deleted/removed records from the stored JSONL files.
#[derive(Debug)]
pub struct CompliancePurger {
    posts_dir: PathBuf,
    enabled: bool,
    interval: ChronoDuration,
    last_purge: Option<DateTime<Utc>>,
}

impl CompliancePurger {
    pub fn new(posts_dir: impl Into<PathBuf>, compliance: &ComplianceConfig) -> Self {
        let interval =
            i64::try_from(compliance.purge_interval_hours.min(MAX_PURGE_INTERVAL_HOURS))
                .ok()
                .and_then(ChronoDuration::try_hours)
                .unwrap_or_else(ChronoDuration::zero);
        Self {
            posts_dir: posts_dir.into(),
            enabled: compliance.purge_deleted_content,
            interval,
            last_purge: None,
        }
    }

    pub fn last_purge(&self) -> Option<DateTime<Utc>> {
        self.last_purge
    }

    /// Enabled and never run in this process, or the interval has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self
                .last_purge
                .map(|last| now - last >= self.interval)
                .unwrap_or(true)
    }

    /// Scan every `*.jsonl` file in the posts directory. One bad file is
    /// logged and skipped.
    pub async fn purge(&mut self) -> Result<PurgeReport, StorageError> {
        self.purge_at(Utc::now()).await
    }

    pub async fn purge_at(&mut self, now: DateTime<Utc>) -> Result<PurgeReport, StorageError> {
        let mut report = PurgeReport::default();
        if !self.enabled {
            debug!("Purge disabled in config");
            return Ok(report);
        }

        let mut entries = match tokio::fs::read_dir(&self.posts_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Posts directory does not exist, nothing to purge");
                self.last_purge = Some(now);
                return Ok(report);
            }
            Err(e) => return Err(StorageError::io(&self.posts_dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.posts_dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("jsonl") {
                files.push(path);
            }
        }
        files.sort();

        for path in files {
            report.files_scanned += 1;
            match purge_file(&path).await {
                Ok(0) => {}
                Ok(removed) => {
                    report.files_rewritten += 1;
                    report.records_removed += removed;
                }
                Err(e) => {
                    error!(code = %e.error_code(), "Error purging {}: {}", path.display(), e);
                }
            }
        }

        if report.records_removed > 0 {
            info!(
                "Purged {} deleted/removed entries from {} files",
                report.records_removed, report.files_rewritten
            );
        } else {
            debug!("No entries to purge");
        }

        self.last_purge = Some(now);
        Ok(report)
    }
}

/// Remove flagged records from one file; returns how many were dropped.
/// Malformed lines are kept, blank lines are dropped, and the file is only
/// rewritten when something was removed.
pub async fn purge_file(path: &Path) -> Result<usize, StorageError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;

    let mut kept = String::with_capacity(contents.len());
    let mut removed = 0;

    for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(record) if is_flagged(&record) => {
                removed += 1;
                let fullname = record.get("fullname").and_then(Value::as_str);
                let hint = record.get("removed_hint").and_then(Value::as_str);
                debug!(
                    "Purging {}: {}",
                    fullname.unwrap_or("unknown"),
                    hint.unwrap_or("unknown reason")
                );
            }
            _ => {
                kept.push_str(line);
                kept.push('\n');
            }
        }
    }

    if removed > 0 {
        write_atomic(path, kept.as_bytes()).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Purged {} entries from {}", removed, name);
    }

    Ok(removed)
}

fn is_flagged(record: &Value) -> bool {
    record
        .get(REMOVED_FLAG)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
