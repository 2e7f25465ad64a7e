use crate::api::RedditApiClient;
use redditfeed_core::{CoreError, RedditApiError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

/// Metadata of a custom feed (multireddit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub name: String,
    pub display_name: String,
    pub path: String,
    pub owner: String,
    pub description: String,
    /// Member subreddits in server order.
    pub subreddits: Vec<String>,
    pub visibility: String,
    pub created_utc: f64,
    pub num_subscribers: u64,
}

impl FeedInfo {
    /// Map the `data` object of a `LabeledMulti` response. Missing fields
    /// default; `path` and `owner` fall back to the configured values.
    pub fn from_response(response: &Value, multipath: &str, owner: &str) -> Self {
        let data = response.get("data").unwrap_or(&Value::Null);
        let text = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let subreddits = data
            .get("subreddits")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("name").and_then(Value::as_str))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let non_empty_or = |key: &str, fallback: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        Self {
            name: text("name"),
            display_name: text("display_name"),
            path: non_empty_or("path", multipath),
            owner: non_empty_or("owner", owner),
            description: text("description_md"),
            subreddits,
            visibility: text("visibility"),
            created_utc: data.get("created_utc").and_then(Value::as_f64).unwrap_or(0.0),
            num_subscribers: data
                .get("num_subscribers")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        }
    }
}

/// One-shot existence/access check for the configured feed.
#[derive(Debug, Clone)]
pub struct FeedValidator {
    client: RedditApiClient,
}

impl FeedValidator {
    pub fn new(client: RedditApiClient) -> Self {
        Self { client }
    }

    /// GET `/api/multi{multipath}`. 404 and 403 become the matching
    /// `ValidationError`, other API errors are wrapped; auth failures and
    /// cancellation pass through.
    pub async fn validate(&self, multipath: &str, owner: &str) -> Result<FeedInfo, CoreError> {
        info!("Validating custom feed: {}", multipath);
        let endpoint = format!("/api/multi{}", multipath);

        let response = match self.client.get(&endpoint, &[]).await {
            Ok(response) => response,
            Err(CoreError::RedditApi(api_error)) => {
                return Err(map_api_error(api_error, multipath).into());
            }
            Err(other) => return Err(other),
        };

        let info = FeedInfo::from_response(&response, multipath, owner);
        info!(
            "Custom feed validated: {} ({} subreddits, visibility: {})",
            info.display_name,
            info.subreddits.len(),
            info.visibility
        );
        Ok(info)
    }
}

fn map_api_error(api_error: RedditApiError, multipath: &str) -> ValidationError {
    let path = multipath.to_string();
    match api_error.status_code() {
        Some(404) => {
            error!("Custom feed not found: {}", multipath);
            ValidationError::NotFound { path }
        }
        Some(403) => {
            error!("Access denied to custom feed: {}", multipath);
            ValidationError::AccessDenied { path }
        }
        _ => ValidationError::Api {
            path,
            source: api_error,
        },
    }
}
