//! OAuth 2.0 access tokens for Google APIs.
//!
//! Two flows are supported: the service-account JWT bearer grant used for
//! the spreadsheet, and the refresh-token grant used for uploads. Both cache
//! the token until shortly before it expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::credentials::{ServiceAccountKey, YouTubeOAuth};
use crate::error::ProviderError;
use crate::http::check_status;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
/// Files created by this app only.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of bearer tokens for Google API calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Default)]
struct TokenCache(Mutex<Option<CachedToken>>);

impl TokenCache {
    fn get(&self) -> Option<String> {
        self.0
            .lock()
            .as_ref()
            .filter(|t| Instant::now() < t.refresh_at)
            .map(|t| t.value.clone())
    }

    fn store(&self, response: &TokenResponse) {
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        *self.0.lock() = Some(CachedToken {
            value: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
    }
}

async fn request_token<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    form: &T,
) -> Result<TokenResponse, ProviderError> {
    let response = client.post(url).form(form).send().await?;
    let response = check_status(response).await?;
    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::invalid(format!("token response: {}", e)))?;
    if token.access_token.is_empty() {
        return Err(ProviderError::invalid("token response has no access_token"));
    }
    Ok(token)
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// JWT bearer flow for a service account.
pub struct ServiceAccountTokenSource {
    client: Client,
    key: ServiceAccountKey,
    scope: String,
    cache: TokenCache,
}

impl ServiceAccountTokenSource {
    pub fn new(client: Client, key: ServiceAccountKey, scope: impl Into<String>) -> Self {
        Self {
            client,
            key,
            scope: scope.into(),
            cache: TokenCache::default(),
        }
    }

    /// Signed RS256 assertion for the token endpoint.
    pub fn assertion(&self) -> Result<String, ProviderError> {
        let iat = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.expose().as_bytes())
            .map_err(|e| ProviderError::local(format!("invalid service account key: {}", e)))?;

        jsonwebtoken::encode(&header, &claims, &encoding_key)
            .map_err(|e| ProviderError::local(format!("failed to sign assertion: {}", e)))
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.cache.get() {
            return Ok(token);
        }

        let assertion = self.assertion()?;
        let token = request_token(
            &self.client,
            &self.key.token_uri,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
        )
        .await?;

        tracing::debug!(
            account = %self.key.client_email,
            expires_in = token.expires_in,
            "Obtained service account token"
        );
        self.cache.store(&token);
        Ok(token.access_token)
    }
}

/// Refresh-token flow for an installed-app OAuth client.
pub struct RefreshTokenSource {
    client: Client,
    token_url: String,
    oauth: YouTubeOAuth,
    cache: TokenCache,
}

impl RefreshTokenSource {
    pub fn new(client: Client, token_url: impl Into<String>, oauth: YouTubeOAuth) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            oauth,
            cache: TokenCache::default(),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for RefreshTokenSource {
    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.cache.get() {
            return Ok(token);
        }

        let token = request_token(
            &self.client,
            &self.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.expose()),
                ("refresh_token", self.oauth.refresh_token.expose()),
            ],
        )
        .await?;

        tracing::debug!(expires_in = token.expires_in, "Refreshed upload token");
        self.cache.store(&token);
        Ok(token.access_token)
    }
}

/// Fixed token; for tests and local tooling.
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, ProviderError> {
        Ok(self.0.clone())
    }
}
