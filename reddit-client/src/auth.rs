use chrono::{DateTime, Duration as ChronoDuration, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenType};
use oauth2::{
    AccessToken, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RefreshToken,
    RequestTokenError, TokenResponse, TokenUrl,
};
use redditfeed_core::{
    AuthConfig, AuthError, ConfigError, CoreError, EndpointsConfig, MAX_TOKEN_EXPIRY_BUFFER_SEC,
};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Cached bearer token. `AccessToken` redacts itself in `Debug` output.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: AccessToken,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

impl Token {
    fn is_fresh(&self, buffer: ChronoDuration, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(buffer)
            .is_some_and(|deadline| now < deadline)
    }
}

/// Transport failures surfaced to oauth2 from the token request.
#[derive(Debug, Error)]
pub enum TokenTransportError {
    #[error("token endpoint rejected the client credentials")]
    Unauthorized,

    #[error("token request failed: {0}")]
    Network(#[source] reqwest::Error),
}

/// Exchanges the long-lived refresh token for short-lived access tokens and
/// caches the result until it is within `expiry_buffer` of expiring.
///
/// The cache lock is held across the exchange, so concurrent callers share
/// a single in-flight refresh.
#[derive(Debug)]
pub struct TokenManager {
    oauth: BasicClient,
    http: reqwest::Client,
    refresh_token: RefreshToken,
    expiry_buffer: ChronoDuration,
    token: Mutex<Option<Token>>,
}

impl TokenManager {
    pub fn new(
        auth: &AuthConfig,
        endpoints: &EndpointsConfig,
        http: reqwest::Client,
    ) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(endpoints.authorize_url()).map_err(|_| {
            ConfigError::InvalidValue {
                field: "reddit.endpoints.www_base".to_string(),
                value: endpoints.www_base.clone(),
            }
        })?;
        let token_url = TokenUrl::new(endpoints.token_url()).map_err(|_| {
            ConfigError::InvalidValue {
                field: "reddit.endpoints.www_base".to_string(),
                value: endpoints.www_base.clone(),
            }
        })?;

        let oauth = BasicClient::new(
            ClientId::new(auth.client_id.clone()),
            Some(ClientSecret::new(auth.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        let expiry_buffer =
            i64::try_from(auth.token_expiry_buffer_sec.min(MAX_TOKEN_EXPIRY_BUFFER_SEC))
                .ok()
                .and_then(ChronoDuration::try_seconds)
                .unwrap_or_else(ChronoDuration::zero);

        Ok(Self {
            oauth,
            http,
            refresh_token: RefreshToken::new(auth.refresh_token.clone()),
            expiry_buffer,
            token: Mutex::new(None),
        })
    }

    /// Return a valid access token, refreshing first when the cached one is
    /// missing or inside the expiry buffer.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(self.expiry_buffer, Utc::now()) {
                debug!("Using cached access token");
                return Ok(token.access_token.secret().clone());
            }
            info!("Cached token expired or expiring soon, refreshing");
        }

        let token = self.request_token().await?;
        let secret = token.access_token.secret().clone();
        *cached = Some(token);
        Ok(secret)
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        info!("Invalidating cached access token");
        *self.token.lock().await = None;
    }

    pub async fn is_token_valid(&self) -> bool {
        self.token
            .lock()
            .await
            .as_ref()
            .map(|token| token.is_fresh(self.expiry_buffer, Utc::now()))
            .unwrap_or(false)
    }

    async fn request_token(&self) -> Result<Token, AuthError> {
        info!("Requesting new access token using refresh_token");
        let requested_at = Utc::now();

        let response = self
            .oauth
            .exchange_refresh_token(&self.refresh_token)
            .request_async(|request| send_token_request(&self.http, request))
            .await
            .map_err(|err| match err {
                RequestTokenError::Request(TokenTransportError::Unauthorized) => {
                    AuthError::InvalidClient
                }
                RequestTokenError::Request(TokenTransportError::Network(source)) => {
                    error!("Network error during token request");
                    AuthError::Network(source)
                }
                RequestTokenError::ServerResponse(response) => match response.error() {
                    BasicErrorResponseType::InvalidGrant => AuthError::InvalidGrant,
                    BasicErrorResponseType::InvalidClient => AuthError::InvalidClient,
                    _ => AuthError::TokenRequestFailed {
                        reason: response.to_string(),
                    },
                },
                RequestTokenError::Parse(..) => AuthError::TokenRequestFailed {
                    reason: "unparseable token response".to_string(),
                },
                RequestTokenError::Other(reason) => AuthError::TokenRequestFailed { reason },
            })?;

        let expires_in = response
            .expires_in()
            .and_then(|duration| ChronoDuration::from_std(duration).ok())
            .unwrap_or_else(|| ChronoDuration::seconds(DEFAULT_EXPIRES_IN_SECS));

        let token_type = match response.token_type() {
            BasicTokenType::Bearer => "bearer".to_string(),
            BasicTokenType::Extension(other) => other.clone(),
            _ => "mac".to_string(),
        };

        let scope = response
            .scopes()
            .map(|scopes| {
                scopes
                    .iter()
                    .map(|scope| scope.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        info!(
            "Successfully obtained access token (expires in {}s, scope: {})",
            expires_in.num_seconds(),
            scope
        );

        Ok(Token {
            access_token: response.access_token().clone(),
            token_type,
            expires_at: requested_at
                .checked_add_signed(expires_in)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            scope,
        })
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, token: Token) {
        *self.token.lock().await = Some(token);
    }
}

/// oauth2 transport over the shared reqwest client. Response bodies are
/// never logged since they carry tokens.
async fn send_token_request(
    http: &reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, TokenTransportError> {
    let response = http
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await
        .map_err(TokenTransportError::Network)?;

    let mut status_code = response.status();
    debug!("Token request response status: {}", status_code);

    if status_code == StatusCode::UNAUTHORIZED {
        return Err(TokenTransportError::Unauthorized);
    }

    let headers = response.headers().clone();
    let mut body = response
        .bytes()
        .await
        .map_err(TokenTransportError::Network)?
        .to_vec();

    if status_code == StatusCode::OK {
        if let Ok(mut value) = serde_json::from_slice::<Value>(&body) {
            // Reddit reports some grant errors as `200 {"error": ...}`.
            if is_error_body(&value) {
                status_code = StatusCode::BAD_REQUEST;
            } else if fill_token_type(&mut value) {
                body = serde_json::to_vec(&value).unwrap_or(body);
            }
        }
    }

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn is_error_body(value: &Value) -> bool {
    value.get("error").is_some() && value.get("access_token").is_none()
}

/// Default a missing `token_type` to bearer. Returns whether it was added.
fn fill_token_type(value: &mut Value) -> bool {
    match value.as_object_mut() {
        Some(fields) if !fields.contains_key("token_type") => {
            fields.insert("token_type".to_string(), Value::from("bearer"));
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager_for(server: &MockServer, buffer_sec: u64) -> TokenManager {
        let auth = AuthConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
            token_expiry_buffer_sec: buffer_sec,
        };
        let endpoints = EndpointsConfig {
            www_base: server.uri(),
            oauth_base: server.uri(),
        };
        TokenManager::new(&auth, &endpoints, reqwest::Client::new()).unwrap()
    }

    fn token_body(access_token: &str, expires_in: u64) -> serde_json::Value {
        json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": expires_in,
            "scope": "read"
        })
    }

    #[tokio::test]
    async fn test_token_cached_between_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        assert!(!manager.is_token_valid().await);

        assert_eq!(manager.access_token().await.unwrap(), "tok-1");
        assert_eq!(manager.access_token().await.unwrap(), "tok-1");
        assert!(manager.is_token_valid().await);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 3600)))
            .expect(2)
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        manager.access_token().await.unwrap();
        manager.invalidate().await;
        assert!(!manager.is_token_valid().await);
        manager.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_token_inside_buffer_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short", 200)))
            .expect(2)
            .mount(&server)
            .await;

        // 200s lifetime with a 300s buffer is never fresh.
        let manager = manager_for(&server, 300);
        manager.access_token().await.unwrap();
        manager.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_seeded_fresh_token_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("new", 3600)))
            .expect(0)
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        manager
            .seed(Token {
                access_token: AccessToken::new("seeded".to_string()),
                token_type: "bearer".to_string(),
                expires_at: Utc::now() + ChronoDuration::hours(1),
                scope: "read".to_string(),
            })
            .await;

        assert_eq!(manager.access_token().await.unwrap(), "seeded");
    }

    fn seeded_token(expires_in_secs: i64) -> Token {
        Token {
            access_token: AccessToken::new("seeded".to_string()),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + ChronoDuration::seconds(expires_in_secs),
            scope: "read".to_string(),
        }
    }

    #[tokio::test]
    async fn test_seeded_token_outside_buffer_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("new", 3600)))
            .expect(0)
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        manager.seed(seeded_token(400)).await;

        assert!(manager.is_token_valid().await);
        assert_eq!(manager.access_token().await.unwrap(), "seeded");
    }

    #[tokio::test]
    async fn test_seeded_token_inside_buffer_is_refreshed_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        manager.seed(seeded_token(100)).await;

        assert!(!manager.is_token_valid().await);
        assert_eq!(manager.access_token().await.unwrap(), "fresh");
        assert_eq!(manager.access_token().await.unwrap(), "fresh");
    }

    #[test]
    fn test_oversized_buffer_does_not_panic() {
        let auth = AuthConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
            token_expiry_buffer_sec: u64::MAX,
        };
        let endpoints = EndpointsConfig {
            www_base: "https://www.reddit.com".to_string(),
            oauth_base: "https://oauth.reddit.com".to_string(),
        };
        let manager = TokenManager::new(&auth, &endpoints, reqwest::Client::new()).unwrap();
        assert_eq!(
            manager.expiry_buffer,
            ChronoDuration::seconds(MAX_TOKEN_EXPIRY_BUFFER_SEC as i64)
        );
        assert!(!seeded_token(3600).is_fresh(manager.expiry_buffer, Utc::now()));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("shared", 3600))
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        let (a, b, c) = tokio::join!(
            manager.access_token(),
            manager.access_token(),
            manager.access_token()
        );
        assert_eq!(a.unwrap(), "shared");
        assert_eq!(b.unwrap(), "shared");
        assert_eq!(c.unwrap(), "shared");
    }

    #[tokio::test]
    async fn test_missing_token_type_and_expiry_use_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "bare"})))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        assert_eq!(manager.access_token().await.unwrap(), "bare");

        let token = manager.token.lock().await.clone().unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.scope, "");
        let lifetime = token.expires_at - Utc::now();
        assert!(lifetime > ChronoDuration::seconds(3500));
        assert!(lifetime <= ChronoDuration::seconds(3600));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_invalid_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized", "error": 401})),
            )
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InvalidClient)));
    }

    #[tokio::test]
    async fn test_invalid_grant_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InvalidGrant)));
    }

    #[tokio::test]
    async fn test_invalid_grant_in_ok_body_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InvalidGrant)));
    }

    #[tokio::test]
    async fn test_garbage_body_is_request_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let manager = manager_for(&server, 300);
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Auth(AuthError::TokenRequestFailed { .. })
        ));
    }
}
