//! Authenticated HTTP transport for the registry API.
//!
//! [`RegistryClient`] is built once during configure and shared read-only by
//! every resource operation. Each request:
//!
//! - carries `Authorization: Bearer <token>`,
//! - carries `Content-Type: application/json` when it has a body,
//! - is bounded by the configured timeout,
//! - is abandoned if the provider is stopped.
//!
//! Status codes are not interpreted here; callers use
//! [`RawResponse::expect_status`].

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::AccessToken;
use crate::error::ProviderError;
use crate::types::Operation;

/// Status and body of a registry response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, possibly empty.
    pub body: Bytes,
}

impl RawResponse {
    /// Succeed only if the status is exactly `expected`.
    pub fn expect_status(self, operation: Operation, expected: u16) -> Result<Self, ProviderError> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(ProviderError::UnexpectedStatus {
                operation,
                expected,
                status: self.status,
                body: String::from_utf8_lossy(&self.body).trim().to_string(),
            })
        }
    }
}

/// HTTP client bound to one registry base URL and one access token.
#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: Url,
    token: AccessToken,
    timeout: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RegistryClient {
    /// Create a client for `base_url` that authenticates with `token`.
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        token: AccessToken,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            base_url,
            token,
            timeout,
            cancel,
        }
    }

    /// The registry base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the URL for `segments` below the base URL.
    ///
    /// Each segment is percent-encoded, so ids may contain `/` or `?`.
    pub fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send one request and return its raw response.
    ///
    /// Transport failures (connect errors, timeouts, body read errors) are
    /// reported before any part of the response is inspected.
    #[instrument(skip(self, segments, body), fields(method = %method, url))]
    pub async fn send(
        &self,
        operation: Operation,
        method: Method,
        segments: &[&str],
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, ProviderError> {
        let url = self.url_for(segments);
        tracing::Span::current().record("url", url.as_str());

        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(self.token.secret())
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(RawResponse { status, body })
        };

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(ProviderError::cancelled(operation));
            }
            result = exchange => {
                result.map_err(|source| ProviderError::Transport { operation, source })?
            }
        };

        debug!(status = response.status, "Registry responded");
        Ok(response)
    }
}
