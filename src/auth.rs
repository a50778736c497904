//! Azure AD client-credential token acquisition.
//!
//! [`ClientCredentialProvider`] first looks for a cached token that is still
//! valid for the requested tenant, client and scopes. On a miss it performs
//! the OAuth2 client-credentials grant against
//! `<authority>/<tenant>/oauth2/v2.0/token` and caches the result. There is
//! no retry and no backoff: a failed or timed-out grant is reported as
//! [`ProviderError::Auth`].

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{Credentials, DEFAULT_REQUEST_TIMEOUT};
use crate::error::ProviderError;

/// Tokens expiring within this window are not served from the cache.
pub const EXPIRY_SKEW: Duration = Duration::from_secs(60);

const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Upper bound on the lifetime accepted from a token response.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// A bearer token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct AccessToken {
    value: Arc<SecretString>,
    expires_at: Instant,
}

impl AccessToken {
    /// Create a token valid for `lifetime` from now, capped at
    /// [`MAX_TOKEN_LIFETIME`].
    pub fn new(value: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            value: Arc::new(SecretString::from(value.into())),
            expires_at: Instant::now() + lifetime.min(MAX_TOKEN_LIFETIME),
        }
    }

    /// The raw token, for the `Authorization` header.
    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }

    /// When the token expires.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the token remains valid past `now` plus [`EXPIRY_SKEW`].
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now + EXPIRY_SKEW
    }
}

/// Source of access tokens for the registry.
#[async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Acquire a token for `scopes` using `credentials`.
    async fn acquire(
        &self,
        credentials: &Credentials,
        scopes: &[String],
    ) -> Result<AccessToken, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    tenant_id: String,
    client_id: String,
    scopes: Vec<String>,
}

impl CacheKey {
    fn new(credentials: &Credentials, scopes: &[String]) -> Self {
        let mut scopes = scopes.to_vec();
        scopes.sort();
        Self {
            tenant_id: credentials.tenant_id.clone(),
            client_id: credentials.client_id.clone(),
            scopes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Confidential-client token provider for one authority.
pub struct ClientCredentialProvider {
    http: reqwest::Client,
    authority: Url,
    timeout: Duration,
    cache: RwLock<HashMap<CacheKey, AccessToken>>,
}

impl std::fmt::Debug for ClientCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialProvider")
            .field("authority", &self.authority.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientCredentialProvider {
    /// Create a provider for `authority` (e.g. `https://login.microsoftonline.com`).
    pub fn new(http: reqwest::Client, authority: &str) -> Result<Self, ProviderError> {
        let authority = Url::parse(authority).map_err(|e| {
            ProviderError::Configuration(format!("invalid authority {}: {}", authority, e))
        })?;
        if authority.cannot_be_a_base() {
            return Err(ProviderError::Configuration(format!(
                "authority {} cannot be used as a base URL",
                authority
            )));
        }
        Ok(Self {
            http,
            authority,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Bound each token request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The token endpoint for `tenant_id`.
    pub fn token_endpoint(&self, tenant_id: &str) -> Url {
        let mut url = self.authority.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([tenant_id, "oauth2", "v2.0", "token"]);
        }
        url
    }

    async fn acquire_silent(&self, key: &CacheKey) -> Option<AccessToken> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|token| token.is_fresh(Instant::now()))
            .cloned()
    }

    async fn acquire_by_credential(
        &self,
        credentials: &Credentials,
        scopes: &[String],
    ) -> Result<AccessToken, ProviderError> {
        let endpoint = self.token_endpoint(&credentials.tenant_id);
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http
            .post(endpoint)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.request_error("token request failed", e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error("failed to read token response", e))?;

        if !status.is_success() {
            let detail = match serde_json::from_slice::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            return Err(ProviderError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let token: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Auth(format!("invalid token response: {}", e)))?;
        if token.access_token.is_empty() {
            return Err(ProviderError::Auth(
                "token response contained an empty access_token".to_string(),
            ));
        }

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN));
        Ok(AccessToken::new(token.access_token, lifetime))
    }

    fn request_error(&self, context: &str, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Auth(format!("{}: timed out after {:?}", context, self.timeout))
        } else {
            ProviderError::Auth(format!("{}: {}", context, err))
        }
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentialProvider {
    #[instrument(
        skip(self, credentials),
        fields(tenant_id = %credentials.tenant_id, client_id = %credentials.client_id)
    )]
    async fn acquire(
        &self,
        credentials: &Credentials,
        scopes: &[String],
    ) -> Result<AccessToken, ProviderError> {
        let key = CacheKey::new(credentials, scopes);

        if let Some(token) = self.acquire_silent(&key).await {
            debug!("Using cached access token");
            return Ok(token);
        }

        debug!("No cached access token, requesting client credential grant");
        let token = match self.acquire_by_credential(credentials, scopes).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Client credential grant failed");
                return Err(e);
            }
        };

        self.cache.write().await.insert(key, token.clone());
        info!("Acquired access token");
        Ok(token)
    }
}
