use chrono::Utc;
use redditfeed_core::{sleep_or_cancel, AppConfig, CoreError, ErrorExt, Post};
use reddit_client::Fetcher;
use std::fmt;
use std::time::Duration;
use storage::{CompliancePurger, PurgeReport, RecordWriter, StateStore};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Where in a poll cycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    FetchListing,
    ProcessPosts,
    WriteRecords,
    SaveState,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::FetchListing => "fetch_listing",
            CycleStage::ProcessPosts => "process_posts",
            CycleStage::WriteRecords => "write_records",
            CycleStage::SaveState => "save_state",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("Poll cycle failed during {stage}: {source}")]
pub struct CycleError {
    pub stage: CycleStage,
    #[source]
    pub source: CoreError,
}

impl CycleError {
    fn at(stage: CycleStage) -> impl FnOnce(CoreError) -> Self {
        move |source| Self { stage, source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, CoreError::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub new_posts: usize,
    pub written: usize,
    pub flagged_removed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub posts_written: u64,
    pub records_purged: u64,
}

/// Drives the poll loop: fetch → filter → enrich → write → record seen →
/// save, with the compliance purge run whenever it is due.
#[derive(Debug)]
pub struct BackgroundService {
    fetcher: Fetcher,
    state: StateStore,
    writer: RecordWriter,
    purger: CompliancePurger,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl BackgroundService {
    pub fn new(
        fetcher: Fetcher,
        state: StateStore,
        writer: RecordWriter,
        purger: CompliancePurger,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            state,
            writer,
            purger,
            poll_interval,
            shutdown,
        }
    }

    /// Load the state file and wire storage from `config`.
    pub async fn from_config(
        config: &AppConfig,
        fetcher: Fetcher,
        shutdown: CancellationToken,
    ) -> Result<Self, CoreError> {
        let state = StateStore::load(
            &config.storage.state_file,
            config.fetch.listing.max_seen_keep,
        )
        .await?;
        let posts_dir = &config.storage.output.posts_dir;

        Ok(Self::new(
            fetcher,
            state,
            RecordWriter::new(posts_dir),
            CompliancePurger::new(posts_dir, &config.storage.compliance),
            config.fetch.listing.poll_interval(),
            shutdown,
        ))
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// One full cycle. Seen fullnames are recorded only after their records
    /// were written; `last_run_utc` is saved even when nothing was new.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        let listing = self
            .fetcher
            .fetch_listing()
            .await
            .map_err(CycleError::at(CycleStage::FetchListing))?;
        report.listed = listing.len();

        let posts = self
            .fetcher
            .process_new_posts(listing, self.state.seen())
            .await
            .map_err(CycleError::at(CycleStage::ProcessPosts))?;
        report.new_posts = posts.len();
        report.flagged_removed = posts.iter().filter(|p| p.is_removed).count();

        if !posts.is_empty() {
            report.written = self
                .writer
                .write_posts(&posts)
                .await
                .map_err(|e| CycleError::at(CycleStage::WriteRecords)(e.into()))?;
            self.state.record_seen(fullnames(&posts));
        }

        self.state.mark_run(Utc::now());
        self.state
            .save()
            .await
            .map_err(|e| CycleError::at(CycleStage::SaveState)(e.into()))?;

        info!(
            listed = report.listed,
            new_posts = report.new_posts,
            written = report.written,
            flagged_removed = report.flagged_removed,
            "Poll cycle complete"
        );
        Ok(report)
    }

    /// Run the purge if it is due. Failures are logged, not returned.
    pub async fn purge_if_due(&mut self) -> Option<PurgeReport> {
        if !self.purger.is_due(Utc::now()) {
            return None;
        }

        info!("Running compliance purge");
        match self.purger.purge().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(code = %e.error_code(), "Compliance purge failed: {}", e);
                None
            }
        }
    }

    /// Loop cycles until shutdown. A failed cycle is logged and the loop
    /// carries on after the poll interval. State is saved once more on the
    /// way out.
    pub async fn run(&mut self) -> Result<RunSummary, CoreError> {
        let mut summary = RunSummary::default();
        info!(
            "Starting poll loop (interval: {}s)",
            self.poll_interval.as_secs()
        );

        while !self.shutdown.is_cancelled() {
            if let Some(purged) = self.purge_if_due().await {
                summary.records_purged += purged.records_removed as u64;
            }

            summary.cycles += 1;
            match self.run_cycle().await {
                Ok(report) => summary.posts_written += report.written as u64,
                Err(e) if e.is_cancelled() => {
                    debug!("Cycle interrupted by shutdown during {}", e.stage);
                    break;
                }
                Err(e) => {
                    summary.failed_cycles += 1;
                    error!(
                        code = %e.source.error_code(),
                        stage = %e.stage,
                        "Poll cycle failed: {}",
                        e.source
                    );
                }
            }

            debug!("Sleeping {}s until next poll", self.poll_interval.as_secs());
            if sleep_or_cancel(self.poll_interval, &self.shutdown).await.is_err() {
                break;
            }
        }

        info!("Shutting down, saving state");
        self.state.save().await?;
        info!(
            "Poll loop stopped after {} cycles ({} failed), {} posts written",
            summary.cycles, summary.failed_cycles, summary.posts_written
        );
        Ok(summary)
    }
}

fn fullnames(posts: &[Post]) -> Vec<String> {
    posts
        .iter()
        .filter(|post| !post.fullname.is_empty())
        .map(|post| post.fullname.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_display_names_stage() {
        let err = CycleError {
            stage: CycleStage::SaveState,
            source: CoreError::Cancelled,
        };
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("save_state"));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(CycleStage::FetchListing.to_string(), "fetch_listing");
        assert_eq!(CycleStage::WriteRecords.to_string(), "write_records");
    }
}
