pub mod api;
pub mod auth;
pub mod fetcher;
pub mod rate_limiter;
pub mod retry;
pub mod validator;

pub use api::{build_http_client, RedditApiClient, RedditListing, RedditListingData};
pub use auth::{Token, TokenManager};
pub use fetcher::{filter_new, FetchOptions, Fetcher, MAX_IDS_PER_INFO_REQUEST};
pub use rate_limiter::RateLimiter;
pub use retry::RetryConfig;
pub use validator::{FeedInfo, FeedValidator};

use redditfeed_core::{AppConfig, CoreError};
use tokio_util::sync::CancellationToken;


/// The API client plus the validator and fetcher that share it.
#[derive(Debug, Clone)]
pub struct RedditClient {
    api: RedditApiClient,
    validator: FeedValidator,
    fetcher: Fetcher,
}

impl RedditClient {
    pub fn new(api: RedditApiClient, options: FetchOptions) -> Self {
        Self {
            validator: FeedValidator::new(api.clone()),
            fetcher: Fetcher::new(api.clone(), options),
            api,
        }
    }

    pub fn from_config(config: &AppConfig, shutdown: CancellationToken) -> Result<Self, CoreError> {
        let api = RedditApiClient::from_config(config, shutdown)?;
        Ok(Self::new(api, FetchOptions::from_config(config)))
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }

    pub fn validator(&self) -> &FeedValidator {
        &self.validator
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }
}
