//! [`RegistryProvider`]: the registry resource provider.

use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::auth::{ClientCredentialProvider, CredentialProvider};
use crate::config::{
    configuration_diagnostic, AuthFailurePolicy, ProviderConfig, ProviderOptions,
    ATTR_CLIENT_ID, ATTR_CLIENT_SECRET, ATTR_REGISTRY_BASE_URL, ATTR_TENANT_ID,
};
use crate::data_source::{self, DATA_SOURCE_TYPE};
use crate::error::ProviderError;
use crate::resource::{self, RESOURCE_TYPE};
use crate::schema::{has_errors, Attribute, Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::transport::RegistryClient;
use crate::types::{ImportedResource, Operation, PlanResult};
use crate::validation::{validate, validate_result};

/// Provider for registry resources.
///
/// Until [`configure`](ProviderService::configure) succeeds, only schema,
/// validation, planning and import are available. Configure acquires the
/// access token once and builds the shared [`RegistryClient`]; it cannot be
/// repeated on the same instance.
pub struct RegistryProvider {
    options: ProviderOptions,
    http: reqwest::Client,
    credential_provider: Option<Arc<dyn CredentialProvider>>,
    client: OnceLock<Arc<RegistryClient>>,
    cancel: CancellationToken,
    exit: fn(i32) -> !,
}

impl std::fmt::Debug for RegistryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryProvider")
            .field("options", &self.options)
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl Default for RegistryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryProvider {
    /// Create a provider with default options.
    pub fn new() -> Self {
        Self::with_options(ProviderOptions::default())
    }

    /// Create a provider with the given options.
    pub fn with_options(options: ProviderOptions) -> Self {
        Self {
            options,
            http: reqwest::Client::new(),
            credential_provider: None,
            client: OnceLock::new(),
            cancel: CancellationToken::new(),
            exit: std::process::exit,
        }
    }

    /// Use `provider` instead of the Azure AD client-credential flow.
    pub fn with_credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credential_provider = Some(provider);
        self
    }

    /// The options this provider was built with.
    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Whether configure has completed.
    pub fn is_configured(&self) -> bool {
        self.client.get().is_some()
    }

    fn client(&self, operation: Operation) -> Result<Arc<RegistryClient>, ProviderError> {
        self.client.get().cloned().ok_or_else(|| {
            ProviderError::FailedPrecondition(format!(
                "cannot {}: provider not configured",
                operation
            ))
        })
    }

    fn credential_provider(&self) -> Result<Arc<dyn CredentialProvider>, ProviderError> {
        match &self.credential_provider {
            Some(provider) => Ok(Arc::clone(provider)),
            None => Ok(Arc::new(
                ClientCredentialProvider::new(self.http.clone(), &self.options.authority)?
                    .with_timeout(self.options.request_timeout),
            )),
        }
    }

    fn provider_config_schema() -> Schema {
        Schema::v0()
            .with_description("Registry API access through an Azure AD app registration")
            .with_attribute(
                ATTR_TENANT_ID,
                Attribute::required_string()
                    .with_description("Azure AD directory (tenant) id")
                    .sensitive(),
            )
            .with_attribute(
                ATTR_CLIENT_ID,
                Attribute::required_string()
                    .with_description("Application (client) id of the app registration")
                    .sensitive(),
            )
            .with_attribute(
                ATTR_CLIENT_SECRET,
                Attribute::required_string()
                    .with_description("Client secret of the app registration")
                    .sensitive(),
            )
            .with_attribute(
                ATTR_REGISTRY_BASE_URL,
                Attribute::required_string()
                    .with_description("Base URL of the registry API")
                    .sensitive(),
            )
    }
}

fn check_resource_type(resource_type: &str) -> Result<(), ProviderError> {
    if resource_type == RESOURCE_TYPE {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(resource_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for RegistryProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(Self::provider_config_schema())
            .with_resource(RESOURCE_TYPE, resource::schema())
            .with_data_source(DATA_SOURCE_TYPE, data_source::schema())
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = Self::provider_config_schema();
        debug!(config = %schema.redact(&config), "Configure called");

        let parsed = match ProviderConfig::from_value(&config) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Invalid provider configuration");
                return Ok(vec![configuration_diagnostic(&e)]);
            }
        };

        let mut diagnostics = validate(&schema, &config);
        if has_errors(&diagnostics) {
            warn!(
                diagnostics = diagnostics.len(),
                "Provider configuration failed validation"
            );
            return Ok(diagnostics);
        }

        if self.is_configured() {
            return Err(ProviderError::FailedPrecondition(
                "cannot configure: provider is already configured".to_string(),
            ));
        }

        let warnings = parsed.warnings();
        for warning in &warnings {
            warn!(summary = %warning.summary, "Provider configuration warning");
        }
        diagnostics.extend(warnings);

        let credential_provider = self.credential_provider()?;
        let acquire = credential_provider.acquire(&parsed.credentials, &self.options.scopes);
        let acquired = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(ProviderError::cancelled(Operation::Configure));
            }
            result = acquire => result,
        };
        let token = match acquired {
            Ok(token) => token,
            Err(e) => match self.options.auth_failure_policy {
                AuthFailurePolicy::Propagate => {
                    error!(error = %e, "Unable to acquire registry access token");
                    return Err(e);
                }
                AuthFailurePolicy::Abort => {
                    error!(error = %e, "Unable to acquire registry access token, aborting");
                    (self.exit)(1)
                }
            },
        };

        let client = RegistryClient::new(
            self.http.clone(),
            parsed.registry_base_url,
            token,
            self.options.request_timeout,
            self.cancel.clone(),
        );
        self.client.set(Arc::new(client)).map_err(|_| {
            ProviderError::FailedPrecondition(
                "cannot configure: provider is already configured".to_string(),
            )
        })?;

        info!("Provider configured");
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Stopping provider, cancelling in-flight requests");
        self.cancel.cancel();
        Ok(())
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        check_resource_type(resource_type)?;
        let current = resource::schema().version;
        if version < 0 || version as u64 > current {
            return Err(ProviderError::InvalidRequest(format!(
                "cannot upgrade {} state from schema version {} (current is {})",
                resource_type, version, current
            )));
        }
        Ok(state)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        check_resource_type(resource_type)?;
        if !config.is_null() {
            validate_result(&resource::schema(), &config).map_err(|diagnostics| {
                let summaries: Vec<_> = diagnostics.into_iter().map(|d| d.summary).collect();
                ProviderError::Validation(summaries.join("; "))
            })?;
        }
        resource::plan(prior_state, proposed_state)
    }

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        check_resource_type(resource_type)?;
        let client = self.client(Operation::Create)?;
        resource::create(&client, planned_state).await
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        check_resource_type(resource_type)?;
        let client = self.client(Operation::Read)?;
        resource::read(&client, current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        check_resource_type(resource_type)?;
        let client = self.client(Operation::Update)?;
        resource::update(&client, prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        check_resource_type(resource_type)?;
        let client = self.client(Operation::Delete)?;
        resource::delete(&client, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        check_resource_type(resource_type)?;
        resource::import(id)
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        if data_source_type != DATA_SOURCE_TYPE {
            return Err(ProviderError::UnknownResource(data_source_type.to_string()));
        }
        let client = self.client(Operation::ReadDataSource)?;
        data_source::read(&client, config).await
    }
}
