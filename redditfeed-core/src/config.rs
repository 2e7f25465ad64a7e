//! Application configuration: TOML file with `${VAR}` expansion, plus the
//! validation rules that must pass before the poller starts.

use crate::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Reddit caps listing pages at 100 items.
pub const MAX_LISTING_LIMIT: u32 = 100;

pub const MAX_BACKOFF_SEC: f64 = 3600.0;
pub const MAX_TOKEN_EXPIRY_BUFFER_SEC: u64 = 86_400;
/// One year.
pub const MAX_PURGE_INTERVAL_HOURS: u64 = 8_760;

const ALLOWED_SORTS: &[&str] = &["new", "hot", "top", "rising", "controversial", "best"];

const INVALID_USER_AGENT_PREFIXES: &[&str] = &[
    "python-requests/",
    "python-urllib/",
    "java/",
    "apache-httpclient/",
    "go-http-client/",
    "curl/",
    "reqwest/",
];

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid env var regex"))
}

fn multipath_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^/user/([^/]+)/m/([^/]+)$").expect("Invalid multipath regex"))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub custom_feed: CustomFeedConfig,
    pub fetch: FetchConfig,
    pub rate_limit: RateLimitConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub user_agent: String,
    pub endpoints: EndpointsConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub www_base: String,
    pub oauth_base: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            www_base: "https://www.reddit.com".to_string(),
            oauth_base: "https://oauth.reddit.com".to_string(),
        }
    }
}

impl EndpointsConfig {
    pub fn token_url(&self) -> String {
        format!("{}/api/v1/access_token", self.www_base.trim_end_matches('/'))
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/api/v1/authorize", self.www_base.trim_end_matches('/'))
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_expiry_buffer_sec: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            token_expiry_buffer_sec: 300,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &mask_secret(&self.client_id))
            .field("client_secret", &mask_secret(&self.client_secret))
            .field("refresh_token", &mask_secret(&self.refresh_token))
            .field("token_expiry_buffer_sec", &self.token_expiry_buffer_sec)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CustomFeedConfig {
    #[serde(rename = "type")]
    pub feed_type: String,
    pub url: String,
    pub multipath: String,
    pub owner: String,
    pub name: String,
}

impl Default for CustomFeedConfig {
    fn default() -> Self {
        Self {
            feed_type: "multi".to_string(),
            url: String::new(),
            multipath: String::new(),
            owner: String::new(),
            name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub listing: ListingConfig,
    pub per_post: PerPostConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub sort: String,
    pub limit: u32,
    pub poll_interval_sec: u64,
    pub max_seen_keep: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            sort: "new".to_string(),
            limit: 50,
            poll_interval_sec: 60,
            max_seen_keep: 2000,
        }
    }
}

impl ListingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_sec)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerPostConfig {
    pub fetch_post_detail: bool,
    pub fetch_comments: bool,
    pub comments: CommentsConfig,
}

impl Default for PerPostConfig {
    fn default() -> Self {
        Self {
            fetch_post_detail: true,
            fetch_comments: true,
            comments: CommentsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
    pub limit: u32,
    pub depth: u32,
    pub sort: String,
    pub truncate: u32,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            limit: 50,
            depth: 5,
            sort: "top".to_string(),
            truncate: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_qpm: u32,
    pub respect_response_headers: bool,
    pub safety_min_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_qpm: 100,
            respect_response_headers: true,
            safety_min_interval_ms: 700,
        }
    }
}

impl RateLimitConfig {
    pub fn safety_interval(&self) -> Duration {
        Duration::from_millis(self.safety_min_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_sec: u64,
    pub retries: u32,
    pub backoff_sec: f64,
    pub proxy: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_sec: 30,
            retries: 3,
            backoff_sec: 1.0,
            proxy: String::new(),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    /// `backoff_sec` clamped to `0..=MAX_BACKOFF_SEC`; NaN becomes zero.
    pub fn backoff_base(&self) -> Duration {
        Duration::try_from_secs_f64(self.backoff_sec.clamp(0.0, MAX_BACKOFF_SEC))
            .unwrap_or_default()
    }

    pub fn proxy_url(&self) -> Option<&str> {
        let proxy = self.proxy.trim();
        (!proxy.is_empty()).then_some(proxy)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_file: PathBuf,
    pub output: OutputConfig,
    pub compliance: ComplianceConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("./data/state.json"),
            output: OutputConfig::default(),
            compliance: ComplianceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub posts_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            posts_dir: PathBuf::from("./data/posts"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub purge_deleted_content: bool,
    pub purge_interval_hours: u64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            purge_deleted_content: true,
            purge_interval_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "./logs/app.log".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> Option<&Path> {
        let file = self.file.trim();
        (!file.is_empty()).then(|| Path::new(file))
    }
}

impl AppConfig {
    /// Read, expand and parse a config file. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound { path: shown.clone() }
            } else {
                ConfigError::Read {
                    path: shown.clone(),
                    source,
                }
            }
        })?;

        debug!("Loaded configuration from {}", shown);
        Self::from_toml_str(&contents)
    }

    /// Load and validate in one step.
    pub fn load_validated(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Err(ConfigError::InvalidFormat {
                details: "Config file is empty".to_string(),
            });
        }

        let table: toml::Table = toml::from_str(contents)?;
        let mut value = toml::Value::Table(table);
        expand_env_vars(&mut value);

        Ok(value.try_into()?)
    }

    /// Run every validation rule. Blank `custom_feed.owner`/`name` are filled
    /// from the multipath.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        validate_user_agent(&self.reddit.user_agent)?;
        validate_auth_credentials(&self.reddit.auth)?;
        validate_custom_feed(&mut self.custom_feed)?;
        self.validate_endpoints()?;
        self.validate_limits()?;
        Ok(())
    }

    fn validate_endpoints(&self) -> Result<(), ConfigError> {
        let endpoints = &self.reddit.endpoints;
        for (field, value) in [
            ("reddit.endpoints.www_base", &endpoints.www_base),
            ("reddit.endpoints.oauth_base", &endpoints.oauth_base),
        ] {
            url::Url::parse(value).map_err(|_| ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.clone(),
            })?;
        }

        if let Some(proxy) = self.network.proxy_url() {
            url::Url::parse(proxy).map_err(|_| ConfigError::InvalidValue {
                field: "network.proxy".to_string(),
                value: proxy.to_string(),
            })?;
        }
        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        let listing = &self.fetch.listing;
        if listing.limit == 0 || listing.limit > MAX_LISTING_LIMIT {
            return Err(invalid(
                "fetch.listing.limit",
                format!("{} (must be between 1 and {})", listing.limit, MAX_LISTING_LIMIT),
            ));
        }
        if !ALLOWED_SORTS.contains(&listing.sort.as_str()) {
            return Err(invalid(
                "fetch.listing.sort",
                format!("{} (expected one of {})", listing.sort, ALLOWED_SORTS.join(", ")),
            ));
        }
        if listing.poll_interval_sec == 0 {
            return Err(invalid("fetch.listing.poll_interval_sec", "0"));
        }
        if listing.max_seen_keep == 0 {
            return Err(invalid("fetch.listing.max_seen_keep", "0"));
        }
        if self.rate_limit.max_qpm == 0 {
            return Err(invalid("rate_limit.max_qpm", "0"));
        }
        if self.network.timeout_sec == 0 {
            return Err(invalid("network.timeout_sec", "0"));
        }
        let backoff = self.network.backoff_sec;
        if !(0.0..=MAX_BACKOFF_SEC).contains(&backoff) {
            return Err(invalid(
                "network.backoff_sec",
                format!("{} (must be between 0 and {})", backoff, MAX_BACKOFF_SEC),
            ));
        }
        let buffer = self.reddit.auth.token_expiry_buffer_sec;
        if buffer > MAX_TOKEN_EXPIRY_BUFFER_SEC {
            return Err(invalid(
                "reddit.auth.token_expiry_buffer_sec",
                format!("{} (must be at most {})", buffer, MAX_TOKEN_EXPIRY_BUFFER_SEC),
            ));
        }
        let compliance = &self.storage.compliance;
        if compliance.purge_deleted_content
            && !(1..=MAX_PURGE_INTERVAL_HOURS).contains(&compliance.purge_interval_hours)
        {
            return Err(invalid(
                "storage.compliance.purge_interval_hours",
                format!(
                    "{} (must be between 1 and {})",
                    compliance.purge_interval_hours, MAX_PURGE_INTERVAL_HOURS
                ),
            ));
        }
        Ok(())
    }

    /// `/user/{owner}/m/{name}/{sort}`
    pub fn listing_endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.custom_feed.multipath, self.fetch.listing.sort
        )
    }
}

fn invalid(field: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.into(),
    }
}

/// Replace `${VAR}` in every string value; unknown variables stay verbatim.
pub fn expand_env_vars(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => {
            let expanded = env_var_pattern().replace_all(s, |caps: &regex::Captures| {
                std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
            });
            if let std::borrow::Cow::Owned(expanded) = expanded {
                *s = expanded;
            }
        }
        toml::Value::Array(items) => items.iter_mut().for_each(expand_env_vars),
        toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| expand_env_vars(v)),
        _ => {}
    }
}

pub fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "reddit.user_agent".to_string(),
        });
    }

    let lowered = user_agent.to_lowercase();
    if INVALID_USER_AGENT_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return Err(ConfigError::ValidationFailed {
            reason: format!(
                "Invalid user_agent: {}. Reddit requires a unique, descriptive User-Agent; \
                 default library agents are not allowed",
                user_agent
            ),
        });
    }
    Ok(())
}

pub fn validate_auth_credentials(auth: &AuthConfig) -> Result<(), ConfigError> {
    let is_missing = |value: &str| value.trim().is_empty() || value.starts_with("${");

    let missing: Vec<&str> = [
        ("client_id", &auth.client_id),
        ("client_secret", &auth.client_secret),
        ("refresh_token", &auth.refresh_token),
    ]
    .into_iter()
    .filter(|(_, value)| is_missing(value))
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingCredentials {
            fields: missing.join(", "),
        })
    }
}

/// Split a multipath into `(owner, name)`.
pub fn parse_multipath(multipath: &str) -> Result<(String, String), ConfigError> {
    let caps = multipath_pattern()
        .captures(multipath)
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "custom_feed.multipath".to_string(),
            value: format!("{} (must match /user/{{username}}/m/{{multiname}})", multipath),
        })?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

/// Extract `(owner, name)` from a custom feed URL such as
/// `https://www.reddit.com/user/owner/m/name/`.
pub fn parse_custom_feed_url(feed_url: &str) -> Result<(String, String), ConfigError> {
    let parsed = url::Url::parse(feed_url).map_err(|_| ConfigError::InvalidValue {
        field: "custom_feed.url".to_string(),
        value: feed_url.to_string(),
    })?;
    let path = parsed.path().trim_end_matches('/');

    let caps = multipath_pattern()
        .captures(path)
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "custom_feed.url".to_string(),
            value: format!(
                "{} (expected https://www.reddit.com/user/{{username}}/m/{{multiname}}/)",
                feed_url
            ),
        })?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

pub fn validate_custom_feed(feed: &mut CustomFeedConfig) -> Result<(), ConfigError> {
    if feed.feed_type != "multi" {
        return Err(invalid(
            "custom_feed.type",
            format!("{} (must be 'multi')", feed.feed_type),
        ));
    }
    if feed.multipath.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "custom_feed.multipath".to_string(),
        });
    }

    let (path_owner, path_name) = parse_multipath(&feed.multipath)?;

    if feed.owner.is_empty() {
        feed.owner = path_owner.clone();
    }
    if feed.name.is_empty() {
        feed.name = path_name.clone();
    }

    if !feed.url.is_empty() {
        let (url_owner, url_name) = parse_custom_feed_url(&feed.url)?;
        if url_owner != feed.owner {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "custom_feed.owner ({}) does not match URL owner ({})",
                    feed.owner, url_owner
                ),
            });
        }
        if url_name != feed.name {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "custom_feed.name ({}) does not match URL name ({})",
                    feed.name, url_name
                ),
            });
        }
    }

    if path_owner != feed.owner || path_name != feed.name {
        return Err(ConfigError::ValidationFailed {
            reason: format!(
                "custom_feed.multipath ({}) does not match expected path from owner/name: /user/{}/m/{}",
                feed.multipath, feed.owner, feed.name
            ),
        });
    }
    Ok(())
}

/// Mask a secret for display: first four characters, then `***`.
pub fn mask_secret(secret: &str) -> String {
    const VISIBLE: usize = 4;
    if secret.chars().count() <= VISIBLE {
        return "***".to_string();
    }
    let prefix: String = secret.chars().take(VISIBLE).collect();
    format!("{}***", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[reddit]
user_agent = "linux:redditfeed:0.1.0 (by /u/tester)"

[reddit.auth]
client_id = "client-abc"
client_secret = "secret-xyz"
refresh_token = "refresh-123"

[custom_feed]
url = "https://www.reddit.com/user/tester/m/rustfeed/"
multipath = "/user/tester/m/rustfeed"
"#;

    fn valid_config() -> AppConfig {
        AppConfig::from_toml_str(VALID).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = valid_config();
        assert_eq!(config.fetch.listing.sort, "new");
        assert_eq!(config.fetch.listing.limit, 50);
        assert_eq!(config.fetch.listing.max_seen_keep, 2000);
        assert_eq!(config.rate_limit.max_qpm, 100);
        assert_eq!(config.rate_limit.safety_min_interval_ms, 700);
        assert_eq!(config.network.retries, 3);
        assert_eq!(config.reddit.auth.token_expiry_buffer_sec, 300);
        assert_eq!(config.storage.compliance.purge_interval_hours, 24);
        assert_eq!(
            config.reddit.endpoints.token_url(),
            "https://www.reddit.com/api/v1/access_token"
        );
    }

    #[test]
    fn test_valid_config_fills_owner_and_name() {
        let mut config = valid_config();
        config.validate().unwrap();
        assert_eq!(config.custom_feed.owner, "tester");
        assert_eq!(config.custom_feed.name, "rustfeed");
        assert_eq!(config.listing_endpoint(), "/user/tester/m/rustfeed/new");
    }

    #[test]
    fn test_env_vars_expanded() {
        std::env::set_var("REDDITFEED_TEST_CLIENT_ID", "from-env");
        let toml_text = VALID.replace("client-abc", "${REDDITFEED_TEST_CLIENT_ID}");
        let config = AppConfig::from_toml_str(&toml_text).unwrap();
        assert_eq!(config.reddit.auth.client_id, "from-env");
    }

    #[test]
    fn test_unexpanded_credentials_reported_missing() {
        let toml_text = VALID
            .replace("secret-xyz", "${REDDITFEED_TEST_UNSET_SECRET}")
            .replace("refresh-123", "");
        let mut config = AppConfig::from_toml_str(&toml_text).unwrap();

        match config.validate() {
            Err(ConfigError::MissingCredentials { fields }) => {
                assert_eq!(fields, "client_secret, refresh_token");
            }
            other => panic!("Expected MissingCredentials, got {:?}", other),
        }
    }

    #[test]
    fn test_library_user_agent_rejected() {
        assert!(validate_user_agent("python-requests/2.31").is_err());
        assert!(validate_user_agent("CURL/8.0").is_err());
        assert!(validate_user_agent("").is_err());
        assert!(validate_user_agent("linux:myapp:1.0 (by /u/me)").is_ok());
    }

    #[test]
    fn test_listing_limit_capped_at_100() {
        let mut config = valid_config();
        config.fetch.listing.limit = 101;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "fetch.listing.limit"
        ));

        let mut config = valid_config();
        config.fetch.listing.limit = 100;
        assert!(config.validate().is_ok());
    }

    fn rejected_field(config: &mut AppConfig) -> Option<String> {
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_backoff_bounds() {
        for bad in [-1.0, f64::NAN, f64::INFINITY, 1e300, MAX_BACKOFF_SEC + 1.0] {
            let mut config = valid_config();
            config.network.backoff_sec = bad;
            assert_eq!(rejected_field(&mut config).as_deref(), Some("network.backoff_sec"));
            assert!(config.network.backoff_base() <= Duration::from_secs(3600));
        }

        let mut config = valid_config();
        config.network.backoff_sec = MAX_BACKOFF_SEC;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_expiry_buffer_bound() {
        let mut config = valid_config();
        config.reddit.auth.token_expiry_buffer_sec = u64::MAX;
        assert_eq!(
            rejected_field(&mut config).as_deref(),
            Some("reddit.auth.token_expiry_buffer_sec")
        );

        let mut config = valid_config();
        config.reddit.auth.token_expiry_buffer_sec = MAX_TOKEN_EXPIRY_BUFFER_SEC;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_purge_interval_bounds() {
        for bad in [0, MAX_PURGE_INTERVAL_HOURS + 1, u64::MAX] {
            let mut config = valid_config();
            config.storage.compliance.purge_interval_hours = bad;
            assert_eq!(
                rejected_field(&mut config).as_deref(),
                Some("storage.compliance.purge_interval_hours")
            );
        }

        let mut config = valid_config();
        config.storage.compliance.purge_deleted_content = false;
        config.storage.compliance.purge_interval_hours = u64::MAX;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_multipath_rejected() {
        let mut config = valid_config();
        config.custom_feed.url.clear();
        config.custom_feed.multipath = "/r/rust".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_url_mismatch_rejected() {
        let mut config = valid_config();
        config.custom_feed.url = "https://www.reddit.com/user/other/m/rustfeed".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_explicit_owner_mismatch_rejected() {
        let mut config = valid_config();
        config.custom_feed.url.clear();
        config.custom_feed.owner = "someone_else".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_file_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("   \n"),
            Err(ConfigError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_missing_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_validated_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, VALID).unwrap();

        let config = AppConfig::load_validated(&path).unwrap();
        assert_eq!(config.custom_feed.multipath, "/user/tester/m/rustfeed");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abcdefgh"), "abcd***");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "***");
    }

    #[test]
    fn test_auth_debug_masks_secrets() {
        let config = valid_config();
        let debug = format!("{:?}", config.reddit.auth);
        assert!(!debug.contains("secret-xyz"));
        assert!(!debug.contains("refresh-123"));
        assert!(debug.contains("secr***"));
    }

    #[test]
    fn test_example_config_parses_with_defaults() {
        let config = AppConfig::from_toml_str(include_str!("../../config.example.toml")).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(config.custom_feed.multipath, "/user/owner/m/name");
        assert_eq!(config.fetch.listing.limit, defaults.fetch.listing.limit);
        assert_eq!(config.fetch.listing.sort, defaults.fetch.listing.sort);
        assert_eq!(config.rate_limit.max_qpm, defaults.rate_limit.max_qpm);
        assert_eq!(config.network.retries, defaults.network.retries);
        assert_eq!(config.storage.state_file, defaults.storage.state_file);
        assert_eq!(config.logging.file, defaults.logging.file);
    }
}
