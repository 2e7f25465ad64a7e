use chrono::{DateTime, Utc};
use redditfeed_core::{Post, StorageError};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Appends posts as JSON lines to `posts_YYYY-MM-DD.jsonl`, one file per UTC
/// day.
#[derive(Debug, Clone)]
pub struct RecordWriter {
    posts_dir: PathBuf,
}

impl RecordWriter {
    pub fn new(posts_dir: impl Into<PathBuf>) -> Self {
        Self {
            posts_dir: posts_dir.into(),
        }
    }

    pub fn file_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.posts_dir
            .join(format!("posts_{}.jsonl", at.format("%Y-%m-%d")))
    }

    pub async fn write_posts(&self, posts: &[Post]) -> Result<usize, StorageError> {
        self.write_posts_at(posts, Utc::now()).await
    }

    /// Append `posts` to the file for `at`'s date. All lines are encoded
    /// before the file is touched, so an encoding failure writes nothing.
    pub async fn write_posts_at(
        &self,
        posts: &[Post],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        if posts.is_empty() {
            return Ok(0);
        }

        let mut buffer = String::new();
        for post in posts {
            buffer.push_str(&serde_json::to_string(post)?);
            buffer.push('\n');
        }

        tokio::fs::create_dir_all(&self.posts_dir)
            .await
            .map_err(|e| StorageError::io(&self.posts_dir, e))?;

        let path = self.file_for(at);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.flush().await.map_err(|e| StorageError::io(&path, e))?;

        for post in posts {
            debug!("Wrote post {} to {}", post.fullname, path.display());
        }
        info!("Wrote {} posts to {}", posts.len(), path.display());
        Ok(posts.len())
    }
}
