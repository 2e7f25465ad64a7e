use crate::retry::header_seconds;
use redditfeed_core::{sleep_or_cancel, CoreError, RateLimitConfig};
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const QPM_WINDOW: Duration = Duration::from_secs(60);

pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Default)]
struct RateWindow {
    last_request: Option<Instant>,
    recent: VecDeque<Instant>,
    remaining: Option<f64>,
    reset_at: Option<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.recent.front() {
            if now.duration_since(*oldest) >= QPM_WINDOW {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Client-side throttle shared by every API request.
///
/// `acquire` applies, in order: the minimum gap between requests, the
/// trailing 60 second QPM window, and the server-reported quota from the
/// `X-Ratelimit-*` headers. The state lock is held across the waits so
/// callers are serialized.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<RateWindow>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            window: Mutex::new(RateWindow::default()),
        }
    }

    pub async fn acquire(&self, shutdown: &CancellationToken) -> Result<(), CoreError> {
        let mut window = self.window.lock().await;

        // 1. Safety interval
        let min_interval = self.config.safety_interval();
        if let Some(last) = window.last_request {
            let elapsed = Instant::now().saturating_duration_since(last);
            if elapsed < min_interval {
                let wait = min_interval - elapsed;
                debug!("Rate limit: sleeping {}ms (safety interval)", wait.as_millis());
                sleep_or_cancel(wait, shutdown).await?;
            }
        }

        // 2. QPM window
        let now = Instant::now();
        window.prune(now);
        if window.recent.len() >= self.config.max_qpm as usize {
            if let Some(oldest) = window.recent.front().copied() {
                let wait = (oldest + QPM_WINDOW).saturating_duration_since(now);
                if !wait.is_zero() {
                    info!(
                        "Rate limit: sleeping {:.1}s (QPM limit reached)",
                        wait.as_secs_f64()
                    );
                    sleep_or_cancel(wait, shutdown).await?;
                }
            }
            window.prune(Instant::now());
        }

        // 3. Server quota
        if self.config.respect_response_headers {
            if let (Some(remaining), Some(reset_at)) = (window.remaining, window.reset_at) {
                if remaining <= 1.0 {
                    let wait = reset_at.saturating_duration_since(Instant::now());
                    if !wait.is_zero() {
                        info!(
                            "Rate limit: sleeping {:.1}s (X-Ratelimit-Remaining: {})",
                            wait.as_secs_f64(),
                            remaining
                        );
                        sleep_or_cancel(wait, shutdown).await?;
                    }
                    window.remaining = None;
                    window.reset_at = None;
                }
            }
        }

        let now = Instant::now();
        window.last_request = Some(now);
        window.recent.push_back(now);
        Ok(())
    }

    /// Record the quota reported by a response.
    pub async fn update_from_headers(&self, headers: &HeaderMap) {
        if !self.config.respect_response_headers {
            return;
        }

        let remaining = header_f64(headers, HEADER_REMAINING);
        let reset = header_f64(headers, HEADER_RESET);
        if remaining.is_none() && reset.is_none() {
            return;
        }

        let mut window = self.window.lock().await;
        if let Some(remaining) = remaining {
            window.remaining = Some(remaining);
        }
        if let Some(wait) = reset.and_then(header_seconds) {
            window.reset_at = Instant::now().checked_add(wait);
        }

        debug!(
            "Rate limit headers: remaining={:?}, reset_in={:?}s",
            window.remaining, reset
        );
    }

    /// Requests issued inside the trailing QPM window.
    pub async fn requests_in_window(&self) -> usize {
        let mut window = self.window.lock().await;
        window.prune(Instant::now());
        window.recent.len()
    }
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
}
