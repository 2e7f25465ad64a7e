use crate::auth::TokenManager;
use crate::rate_limiter::RateLimiter;
use crate::retry::{classify_status, is_transient, ResponseClass, RetryConfig};
use redditfeed_core::{
    sleep_or_cancel, AppConfig, AuthError, ConfigError, CoreError, ListingItem, NetworkConfig,
    RedditApiError,
};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_ERROR_BODY_CHARS: usize = 500;

/// A page of a Reddit listing. Every field defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RedditListing<T = ListingItem> {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RedditListingData<T> {
    #[serde(default)]
    pub children: Vec<T>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

impl<T> Default for RedditListingData<T> {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            after: None,
            before: None,
            dist: None,
        }
    }
}

impl RedditListing {
    pub fn from_value(value: Value, endpoint: &str) -> Result<Self, CoreError> {
        serde_json::from_value(value).map_err(|e| {
            CoreError::from(RedditApiError::InvalidResponse {
                endpoint: endpoint.to_string(),
                details: format!("Failed to parse listing: {}", e),
            })
        })
    }

    pub fn into_children(self) -> Vec<ListingItem> {
        self.data.children
    }
}

/// Build the shared HTTP client: user agent, request timeout and optional
/// proxy.
pub fn build_http_client(user_agent: &str, network: &NetworkConfig) -> Result<Client, CoreError> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(network.timeout());

    if let Some(proxy_url) = network.proxy_url() {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|_| ConfigError::InvalidValue {
            field: "network.proxy".to_string(),
            value: proxy_url.to_string(),
        })?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Authenticated, rate-limited client for the OAuth resource API.
///
/// Every attempt waits on the shared rate limiter and resolves a token
/// first. Transient failures (429, 5xx, timeouts, connection errors) are
/// retried with backoff; a 401 invalidates the token and retries once
/// without spending the retry budget.
#[derive(Debug, Clone)]
pub struct RedditApiClient {
    http: Client,
    oauth_base: String,
    tokens: Arc<TokenManager>,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryConfig,
    shutdown: CancellationToken,
}

impl RedditApiClient {
    pub fn new(
        http: Client,
        oauth_base: impl Into<String>,
        tokens: Arc<TokenManager>,
        rate_limiter: Arc<RateLimiter>,
        retry: RetryConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let oauth_base = oauth_base.into().trim_end_matches('/').to_string();
        Self {
            http,
            oauth_base,
            tokens,
            rate_limiter,
            retry,
            shutdown,
        }
    }

    /// Wire up token manager, rate limiter and retry policy from a
    /// validated configuration.
    pub fn from_config(config: &AppConfig, shutdown: CancellationToken) -> Result<Self, CoreError> {
        let http = build_http_client(&config.reddit.user_agent, &config.network)?;
        let tokens = Arc::new(TokenManager::new(
            &config.reddit.auth,
            &config.reddit.endpoints,
            http.clone(),
        )?);
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Ok(Self::new(
            http,
            config.reddit.endpoints.oauth_base.clone(),
            tokens,
            rate_limiter,
            RetryConfig::from(&config.network),
            shutdown,
        ))
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, CoreError> {
        self.request(Method::GET, endpoint, params).await
    }

    pub async fn post(&self, endpoint: &str, form: &[(&str, String)]) -> Result<Value, CoreError> {
        self.request(Method::POST, endpoint, form).await
    }

    /// Issue a request against `{oauth_base}{endpoint}` and return the
    /// parsed JSON body. GET parameters go in the query string, anything
    /// else sends them as a form body.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, CoreError> {
        let url = format!("{}{}", self.oauth_base, endpoint);
        let mut attempt: u32 = 0;
        let mut token_refreshed = false;

        loop {
            self.rate_limiter.acquire(&self.shutdown).await?;
            let access_token = self.tokens.access_token().await?;

            let mut builder = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&access_token);
            builder = if method == Method::GET {
                builder.query(params)
            } else {
                builder.form(params)
            };

            debug!("Request: {} {}", method, endpoint);
            let sent = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => return Err(CoreError::Cancelled),
                sent = builder.send() => sent,
            };

            let response = match sent {
                Ok(response) => response,
                Err(err) if is_transient(&err) && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt, None);
                    let kind = if err.is_timeout() { "timeout" } else { "connection error" };
                    warn!(
                        "Request {}, retrying in {:.1}s (attempt {}/{})",
                        kind,
                        delay.as_secs_f64(),
                        attempt + 1,
                        self.retry.max_retries
                    );
                    sleep_or_cancel(delay, &self.shutdown).await?;
                    attempt += 1;
                    continue;
                }
                Err(err) if err.is_timeout() => {
                    return Err(RedditApiError::RequestTimeout {
                        endpoint: endpoint.to_string(),
                        attempts: attempt,
                        source: err,
                    }
                    .into());
                }
                Err(err) => {
                    return Err(RedditApiError::Transport {
                        endpoint: endpoint.to_string(),
                        source: err,
                    }
                    .into());
                }
            };

            self.rate_limiter.update_from_headers(response.headers()).await;

            let status = response.status();
            match classify_status(status) {
                ResponseClass::Success => return parse_json(response, endpoint).await,
                ResponseClass::Unauthorized if !token_refreshed => {
                    info!("Received 401, attempting token refresh");
                    self.tokens.invalidate().await;
                    token_refreshed = true;
                }
                ResponseClass::Unauthorized => {
                    return Err(AuthError::RejectedAfterRefresh.into());
                }
                ResponseClass::Forbidden => {
                    return Err(RedditApiError::Forbidden {
                        resource: endpoint.to_string(),
                    }
                    .into());
                }
                ResponseClass::NotFound => {
                    return Err(RedditApiError::NotFound {
                        resource: endpoint.to_string(),
                    }
                    .into());
                }
                ResponseClass::RateLimited | ResponseClass::ServerError
                    if self.retry.should_retry(attempt) =>
                {
                    let delay = self.retry.delay_for(attempt, Some(response.headers()));
                    warn!(
                        "Request failed with {}, retrying in {:.1}s (attempt {}/{})",
                        status.as_u16(),
                        delay.as_secs_f64(),
                        attempt + 1,
                        self.retry.max_retries
                    );
                    sleep_or_cancel(delay, &self.shutdown).await?;
                    attempt += 1;
                }
                ResponseClass::RateLimited => {
                    return Err(RedditApiError::RateLimitExceeded {
                        endpoint: endpoint.to_string(),
                        attempts: attempt,
                    }
                    .into());
                }
                ResponseClass::ServerError => {
                    return Err(RedditApiError::ServerError {
                        status_code: status.as_u16(),
                        endpoint: endpoint.to_string(),
                        attempts: attempt,
                    }
                    .into());
                }
                ResponseClass::Unexpected => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(RedditApiError::UnexpectedStatus {
                        status_code: status.as_u16(),
                        endpoint: endpoint.to_string(),
                        body: truncate_body(&body),
                    }
                    .into());
                }
            }
        }
    }
}

async fn parse_json(response: Response, endpoint: &str) -> Result<Value, CoreError> {
    response.json::<Value>().await.map_err(|e| {
        CoreError::from(RedditApiError::InvalidResponse {
            endpoint: endpoint.to_string(),
            details: e.to_string(),
        })
    })
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        truncated.push_str("...");
        truncated
    }
}
