//! Registry Provider
//!
//! An infrastructure provider that manages named resources in the registry
//! API. It signs in to Azure AD with the OAuth2 client-credentials flow and
//! maps the host's resource lifecycle onto HTTP calls:
//!
//! | Host operation | Registry call                 | Success |
//! |----------------|-------------------------------|---------|
//! | create         | `POST /resources` `{name}`    | 200     |
//! | read           | `GET /resources/{id}`         | 200     |
//! | update         | `PUT /resources` `{id, name}` | 204     |
//! | delete         | `DELETE /resources/{id}`      | 204     |
//!
//! # Overview
//!
//! - [`auth`]: access token acquisition (cached, then client-credential grant)
//! - [`transport`]: authenticated requests with a uniform timeout
//! - [`codec`]: wire format and host state conversion
//! - [`resource`] and [`data_source`]: the `registry_resources` lifecycle
//! - [`provider`]: [`RegistryProvider`], the [`ProviderService`] implementation
//!
//! # Quick Start
//!
//! ```ignore
//! use registry_provider::{init_logging, ProviderService, RegistryProvider};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = RegistryProvider::new();
//!     provider
//!         .configure(json!({
//!             "azure_tenant_id": "00000000-0000-0000-0000-000000000000",
//!             "azure_client_id": "11111111-1111-1111-1111-111111111111",
//!             "azure_client_secret": "...",
//!             "registry_base_url": "https://registry.example.com/api"
//!         }))
//!         .await?;
//!
//!     let state = provider
//!         .create("registry_resources", json!({"id": null, "name": "widget"}))
//!         .await?;
//!     tracing::info!(%state, "created");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod codec;
pub mod config;
pub mod data_source;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod service;
pub mod testing;
pub mod transport;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use auth::{AccessToken, ClientCredentialProvider, CredentialProvider};
pub use codec::{DeclaredResource, RemoteResource};
pub use config::{AuthFailurePolicy, ProviderConfig, ProviderOptions};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::RegistryProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use transport::RegistryClient;
pub use types::{
    AttributeChange, ImportedResource, LifecycleState, Operation, PlanResult, ProviderMetadata,
};
pub use validation::{validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
