use crate::CoreError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless `shutdown` fires first.
///
/// Returns `CoreError::Cancelled` when interrupted, so callers can bail out
/// with `?` at every blocking point.
pub async fn sleep_or_cancel(
    duration: Duration,
    shutdown: &CancellationToken,
) -> Result<(), CoreError> {
    if duration.is_zero() {
        return if shutdown.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        };
    }

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => Err(CoreError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
