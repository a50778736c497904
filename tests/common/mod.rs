//! Shared fixtures for the registry provider integration tests.
//!
//! One wiremock server plays both Azure AD (token endpoint) and the
//! registry API.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use registry_provider::{ProviderOptions, RegistryProvider};

pub const TENANT_ID: &str = "tenant-1";
pub const CLIENT_ID: &str = "client-1";
pub const CLIENT_SECRET: &str = "s3cr3t";
pub const ACCESS_TOKEN: &str = "token-abc";
pub const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

/// Provider configuration pointing at `server`.
pub fn provider_config(server: &MockServer) -> Value {
    json!({
        "azure_tenant_id": TENANT_ID,
        "azure_client_id": CLIENT_ID,
        "azure_client_secret": CLIENT_SECRET,
        "registry_base_url": server.uri(),
    })
}

/// Options that send token requests to `server`.
pub fn options(server: &MockServer) -> ProviderOptions {
    ProviderOptions::new()
        .with_authority(server.uri())
        .with_request_timeout(Duration::from_secs(5))
}

/// A provider that authenticates against `server`.
pub fn provider(server: &MockServer) -> RegistryProvider {
    RegistryProvider::with_options(options(server))
}

/// Mount a token endpoint that grants [`ACCESS_TOKEN`].
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": ACCESS_TOKEN,
        })))
        .mount(server)
        .await;
}

/// Mount a token endpoint that rejects the client secret.
pub async fn mount_token_rejected(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided.",
        })))
        .mount(server)
        .await;
}

/// Answers `POST /resources` by echoing the name with a fresh id.
#[derive(Clone, Default)]
pub struct CreateResponder {
    next_id: Arc<AtomicU32>,
}

impl CreateResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> u32 {
        self.next_id.load(Ordering::SeqCst)
    }
}

impl Respond for CreateResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("res-{}", n),
            "name": body["name"],
        }))
    }
}
