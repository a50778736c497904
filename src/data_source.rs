//! The `registry_resources` data source: look up an existing resource by id.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::codec::DeclaredResource;
use crate::error::ProviderError;
use crate::resource;
use crate::schema::{Attribute, Schema};
use crate::transport::RegistryClient;
use crate::types::{LifecycleState, Operation};

/// Data source type name exposed to the host.
pub const DATA_SOURCE_TYPE: &str = "registry_resources";

/// Schema of the data source.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Look up a registry resource by id")
        .with_attribute(
            "id",
            Attribute::required_string().with_description("Identifier of the resource"),
        )
        .with_attribute(
            "name",
            Attribute::computed_string().with_description("Name of the resource"),
        )
}

/// Fetch the resource named by `config.id`.
#[instrument(skip_all, fields(data_source_type = DATA_SOURCE_TYPE, id))]
pub async fn read(client: &RegistryClient, config: Value) -> Result<Value, ProviderError> {
    let id = DeclaredResource::id_from_state(&config, Operation::ReadDataSource)?;
    let id = id.ok_or_else(|| {
        ProviderError::InvalidRequest("cannot read data source: 'id' must not be empty".to_string())
    })?;
    LifecycleState::from_id(Some(&id)).transition(Operation::ReadDataSource)?;
    tracing::Span::current().record("id", id.as_str());

    let remote = resource::get(client, &id, Operation::ReadDataSource).await?;
    debug!(name = %remote.name, "Read registry resource data source");

    Ok(DeclaredResource::from(remote).into_state())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccessToken;
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RegistryClient {
        RegistryClient::new(
            reqwest::Client::new(),
            Url::parse(&server.uri()).unwrap(),
            AccessToken::new("token-abc", Duration::from_secs(3600)),
            Duration::from_secs(5),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_schema() {
        let schema = schema();
        assert!(schema.attributes["id"].flags.required);
        assert!(schema.attributes["name"].flags.is_computed_only());
    }

    #[tokio::test]
    async fn test_read_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resources/abc-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "abc-1", "name": "widget"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let state = read(&client(&server), json!({"id": "abc-1"})).await.unwrap();
        assert_eq!(state, json!({"id": "abc-1", "name": "widget"}));
    }

    #[tokio::test]
    async fn test_read_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = read(&client(&server), json!({"id": "gone"})).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::NotFound {
                operation: Operation::ReadDataSource,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_read_requires_id() {
        let server = MockServer::start().await;
        let err = read(&client(&server), json!({"id": ""})).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
