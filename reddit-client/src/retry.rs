use redditfeed_core::NetworkConfig;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;

/// Retry budget and backoff base for API requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff is `base_delay * 2^attempt`.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&NetworkConfig> for RetryConfig {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            max_retries: network.retries,
            base_delay: network.backoff_base(),
        }
    }
}

impl RetryConfig {
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay before the retry following `attempt` (zero-based). A parseable
    /// `Retry-After` wins over exponential backoff.
    pub fn delay_for(&self, attempt: u32, headers: Option<&HeaderMap>) -> Duration {
        headers
            .and_then(parse_retry_after)
            .unwrap_or_else(|| calculate_delay(attempt, self.base_delay))
    }
}

/// Exponential backoff without jitter.
pub fn calculate_delay(attempt: u32, base_delay: Duration) -> Duration {
    let multiplier = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base_delay.saturating_mul(multiplier)
}

/// Longest wait a response header can ask for; larger values are clamped.
pub const MAX_SERVER_DELAY: Duration = Duration::from_secs(3600);

/// A header's seconds value as a `Duration`, clamped to `MAX_SERVER_DELAY`.
/// Negative and non-finite values are rejected.
pub fn header_seconds(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds.min(MAX_SERVER_DELAY.as_secs_f64())).ok()
}

/// `Retry-After` as a number of seconds. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()?;

    header_seconds(seconds)
}

/// How the request loop treats a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    ServerError,
    Unexpected,
}

pub fn classify_status(status: StatusCode) -> ResponseClass {
    match status.as_u16() {
        200 => ResponseClass::Success,
        401 => ResponseClass::Unauthorized,
        403 => ResponseClass::Forbidden,
        404 => ResponseClass::NotFound,
        429 => ResponseClass::RateLimited,
        500 | 502 | 503 | 504 => ResponseClass::ServerError,
        _ => ResponseClass::Unexpected,
    }
}

/// Timeouts and connection failures are worth another attempt.
pub fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_exponential_backoff() {
        let base = Duration::from_secs(1);
        assert_eq!(calculate_delay(0, base), Duration::from_secs(1));
        assert_eq!(calculate_delay(1, base), Duration::from_secs(2));
        assert_eq!(calculate_delay(2, base), Duration::from_secs(4));
        assert_eq!(
            calculate_delay(3, Duration::from_millis(500)),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_backoff_saturates() {
        let delay = calculate_delay(64, Duration::from_secs(1));
        assert!(delay >= Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_retry_after_wins() {
        let config = RetryConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

        assert_eq!(config.delay_for(2, Some(&headers)), Duration::from_secs(7));
        assert_eq!(config.delay_for(2, None), Duration::from_secs(4));
    }

    #[test]
    fn test_unparseable_retry_after_falls_back() {
        let config = RetryConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        assert_eq!(config.delay_for(1, Some(&headers)), Duration::from_secs(2));
    }

    #[test]
    fn test_fractional_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1.5"));
        assert_eq!(
            parse_retry_after(&headers),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_huge_retry_after_is_clamped() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1e20"));
        assert_eq!(parse_retry_after(&headers), Some(MAX_SERVER_DELAY));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("-3"));
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("inf"));
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("NaN"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_should_retry_budget() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        };
        assert!(config.should_retry(0));
        assert!(config.should_retry(1));
        assert!(!config.should_retry(2));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::OK), ResponseClass::Success);
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            ResponseClass::Unauthorized
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            ResponseClass::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            ResponseClass::ServerError
        );
        assert_eq!(
            classify_status(StatusCode::NOT_IMPLEMENTED),
            ResponseClass::Unexpected
        );
        assert_eq!(
            classify_status(StatusCode::CREATED),
            ResponseClass::Unexpected
        );
    }
}
