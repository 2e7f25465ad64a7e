//! Flat-file persistence: run state, dated JSONL post records and the
//! compliance purge over them.

pub mod purge;
pub mod state;
pub mod writer;

pub use purge::{CompliancePurger, PurgeReport};
pub use state::{RunState, StateStore};
pub use writer::RecordWriter;

use redditfeed_core::StorageError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;


fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to a sibling temp file, flush it to disk, then rename it
/// over `path`. Readers see either the old file or the new one.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }

    let temp_path = temp_path_for(path);
    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;
    drop(file);

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| StorageError::io(path, e))
}
