use crate::error::*;
use tracing::{error, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!(code = %self.error_code(), "CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::Storage(e) => {
                error!("Storage error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = %self.error_code(), "CoreError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Auth(e) => e.user_friendly_message(),
            CoreError::Validation(e) => e.user_friendly_message(),
            CoreError::Storage(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::Cancelled => "Shutdown requested; operation was interrupted.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.error_code(),
            CoreError::Auth(e) => e.error_code(),
            CoreError::Validation(e) => e.error_code(),
            CoreError::Storage(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::Cancelled => "CANCELLED".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RedditApiError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::RateLimitExceeded { attempts, .. } => format!(
                "Reddit kept rate limiting the request after {} retries. Try again later.",
                attempts
            ),
            RedditApiError::Forbidden { resource } => format!(
                "Access denied to {}. You may not have permission to view this content.",
                resource
            ),
            RedditApiError::NotFound { resource } => {
                format!("Reddit could not find {}.", resource)
            }
            RedditApiError::ServerError { status_code, .. } => format!(
                "Reddit is having trouble (HTTP {}). Try again later.",
                status_code
            ),
            RedditApiError::RequestTimeout { .. } => {
                "Request to Reddit timed out. Please try again.".to_string()
            }
            RedditApiError::Transport { .. } => {
                "Could not connect to Reddit. Check your network or proxy settings.".to_string()
            }
            _ => "Reddit API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT".to_string(),
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN".to_string(),
            RedditApiError::NotFound { .. } => "REDDIT_NOT_FOUND".to_string(),
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR".to_string(),
            RedditApiError::UnexpectedStatus { .. } => "REDDIT_UNEXPECTED_STATUS".to_string(),
            RedditApiError::RequestTimeout { .. } => "REDDIT_TIMEOUT".to_string(),
            RedditApiError::Transport { .. } => "REDDIT_CONNECTION_FAILED".to_string(),
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE".to_string(),
        }
    }
}

impl ErrorExt for AuthError {
    fn log_error(&self) -> &Self {
        error!("AuthError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("AuthError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            AuthError::InvalidClient => {
                "Reddit rejected the client credentials. Check client_id and client_secret."
                    .to_string()
            }
            AuthError::InvalidGrant => {
                "The refresh token is invalid or expired. Reauthorize the application.".to_string()
            }
            AuthError::Network(_) => {
                "Could not reach the Reddit token endpoint. Check your connection.".to_string()
            }
            AuthError::RejectedAfterRefresh => {
                "Reddit rejected a freshly issued token. Check the granted scopes.".to_string()
            }
            AuthError::TokenRequestFailed { reason } => {
                format!("Reddit authentication failed: {}", reason)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            AuthError::InvalidClient => "AUTH_INVALID_CLIENT".to_string(),
            AuthError::InvalidGrant => "AUTH_INVALID_GRANT".to_string(),
            AuthError::TokenRequestFailed { .. } => "AUTH_TOKEN_REQUEST_FAILED".to_string(),
            AuthError::Network(_) => "AUTH_NETWORK".to_string(),
            AuthError::RejectedAfterRefresh => "AUTH_REJECTED".to_string(),
        }
    }
}

impl ErrorExt for ValidationError {
    fn log_error(&self) -> &Self {
        error!("ValidationError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ValidationError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ValidationError::NotFound { path } => format!(
                "Custom feed {} not found. Check that it exists and the path is correct.",
                path
            ),
            ValidationError::AccessDenied { path } => format!(
                "Access denied to custom feed {}. It may be private.",
                path
            ),
            ValidationError::Api { path, source } => format!(
                "Could not validate custom feed {}: {}",
                path,
                source.user_friendly_message()
            ),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ValidationError::NotFound { .. } => "FEED_NOT_FOUND".to_string(),
            ValidationError::AccessDenied { .. } => "FEED_ACCESS_DENIED".to_string(),
            ValidationError::Api { .. } => "FEED_VALIDATION_FAILED".to_string(),
        }
    }
}

impl ErrorExt for StorageError {
    fn log_error(&self) -> &Self {
        error!("StorageError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("StorageError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            StorageError::Io { path, .. } => format!(
                "Could not read or write {}. Check permissions and free space.",
                path.display()
            ),
            StorageError::CorruptState { path, .. } => format!(
                "State file {} is not valid JSON. Fix or remove it.",
                path.display()
            ),
            StorageError::Serialize(_) => "Failed to encode a post record.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            StorageError::Io { .. } => "STORAGE_IO".to_string(),
            StorageError::CorruptState { .. } => "STORAGE_CORRUPT_STATE".to_string(),
            StorageError::Serialize(_) => "STORAGE_SERIALIZE".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file not found: {}", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, value } => {
                format!("Invalid value for configuration field '{}': {}", field, value)
            }
            ConfigError::MissingCredentials { fields } => format!(
                "Missing auth credentials: {}. Set them in the config file or as environment variables.",
                fields
            ),
            ConfigError::Parse(e) => format!("Configuration file is not valid TOML: {}", e),
            _ => format!("Configuration error: {}", self),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::Read { .. } => "CONFIG_READ_FAILED".to_string(),
            ConfigError::InvalidFormat { .. } => "CONFIG_INVALID_FORMAT".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingCredentials { .. } => "CONFIG_MISSING_CREDENTIALS".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}
