use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Feed validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Operation cancelled by shutdown")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum RedditApiError {
    #[error("Rate limit exceeded for {endpoint} after {attempts} retries")]
    RateLimitExceeded { endpoint: String, attempts: u32 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Server error {status_code} for {endpoint} after {attempts} retries")]
    ServerError {
        status_code: u16,
        endpoint: String,
        attempts: u32,
    },

    #[error("Unexpected status {status_code} for {endpoint}: {body}")]
    UnexpectedStatus {
        status_code: u16,
        endpoint: String,
        body: String,
    },

    #[error("Request to {endpoint} timed out after {attempts} retries")]
    RequestTimeout {
        endpoint: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Connection to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid API response from {endpoint}: {details}")]
    InvalidResponse { endpoint: String, details: String },
}

impl RedditApiError {
    /// HTTP status carried by this error, if the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RedditApiError::RateLimitExceeded { .. } => Some(429),
            RedditApiError::Forbidden { .. } => Some(403),
            RedditApiError::NotFound { .. } => Some(404),
            RedditApiError::ServerError { status_code, .. }
            | RedditApiError::UnexpectedStatus { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid client credentials; check client_id and client_secret")]
    InvalidClient,

    #[error("Invalid or expired refresh token; the application must be reauthorized")]
    InvalidGrant,

    #[error("Token request failed: {reason}")]
    TokenRequestFailed { reason: String },

    #[error("Network error during token request: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Authentication rejected after token refresh")]
    RejectedAfterRefresh,
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Custom feed not found: {path}")]
    NotFound { path: String },

    #[error("Access denied to custom feed: {path}")]
    AccessDenied { path: String },

    #[error("Failed to validate custom feed {path}: {source}")]
    Api {
        path: String,
        #[source]
        source: RedditApiError,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid state file {}: {source}", .path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration format: {details}")]
    InvalidFormat { details: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Missing required auth credentials: {fields}")]
    MissingCredentials { fields: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
