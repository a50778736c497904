//! Provider configuration and authentication tests.

mod common;

use common::*;
use registry_provider::testing::{assert_error_contains, ProviderTester, TestError};
use registry_provider::{ProviderError, ProviderService, RegistryProvider};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn token_is_requested_with_client_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("scope="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expires_in": 3599,
            "access_token": ACCESS_TOKEN,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let diagnostics = assert_ok!(provider.configure(provider_config(&server)).await);
    assert!(diagnostics.is_empty());
    assert!(provider.is_configured());
}

#[tokio::test]
async fn configured_scope_replaces_the_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("scope=api%3A%2F%2Fregistry%2F.default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expires_in": 3599,
            "access_token": ACCESS_TOKEN,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        RegistryProvider::with_options(options(&server).with_scopes(["api://registry/.default"]));
    assert_ok!(provider.configure(provider_config(&server)).await);
}

#[tokio::test]
async fn auth_failure_stops_before_any_resource_call() {
    let server = MockServer::start().await;
    mount_token_rejected(&server).await;
    Mock::given(method("POST"))
        .and(path("/resources"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let err = assert_err!(tester.configure(provider_config(&server)).await);
    match err {
        TestError::Provider(ProviderError::Auth(message)) => {
            assert!(message.contains("invalid_client"), "{message}");
            assert!(!message.contains(CLIENT_SECRET));
        }
        other => panic!("expected auth failure, got {other}"),
    }

    let err = assert_err!(
        tester
            .create("registry_resources", json!({"id": null, "name": "widget"}))
            .await
    );
    assert!(matches!(err, ProviderError::FailedPrecondition(_)));
}

#[tokio::test]
async fn slow_token_endpoint_is_bounded_by_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"expires_in": 3599, "access_token": ACCESS_TOKEN}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let options = options(&server).with_request_timeout(Duration::from_millis(200));
    let provider = RegistryProvider::with_options(options);
    let started = Instant::now();
    let err = assert_err!(provider.configure(provider_config(&server)).await);

    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert!(matches!(err, ProviderError::Auth(_)), "got {err:?}");
    assert!(err.message().contains("timed out"));
    assert!(!provider.is_configured());
}

#[tokio::test]
async fn empty_inputs_are_reported_per_attribute() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cases = [
        ("azure_tenant_id", "Unable to find Azure Tenant Id"),
        ("azure_client_id", "Unable to find Azure Client Id"),
        ("azure_client_secret", "Unable to find Azure Client Secret"),
        ("registry_base_url", "Unable to find registry base URL"),
    ];
    for (attribute, summary) in cases {
        let mut config = provider_config(&server);
        config[attribute] = json!("");

        let provider = provider(&server);
        let diagnostics = assert_ok!(provider.configure(config).await);
        assert_error_contains(&diagnostics, summary);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some(attribute));
        assert!(!provider.is_configured());
    }
}

#[tokio::test]
async fn validate_provider_config_checks_schema() {
    let provider = RegistryProvider::new();

    let diagnostics = assert_ok!(provider.validate_provider_config(json!({})).await);
    assert_eq!(diagnostics.len(), 4);

    let diagnostics = assert_ok!(
        provider
            .validate_provider_config(json!({
                "azure_tenant_id": "t",
                "azure_client_id": "c",
                "azure_client_secret": "s",
                "registry_base_url": 42,
            }))
            .await
    );
    assert_error_contains(&diagnostics, "Invalid type");
}

#[tokio::test]
async fn configure_twice_is_rejected() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let provider = provider(&server);
    assert_ok!(provider.configure(provider_config(&server)).await);
    let err = assert_err!(provider.configure(provider_config(&server)).await);
    assert!(matches!(err, ProviderError::FailedPrecondition(_)));
}
