//! Provider configuration.
//!
//! Host-supplied configuration arrives as a JSON object with four string
//! attributes. [`ProviderConfig::from_value`] turns it into typed settings,
//! reporting the first missing or empty input the same way the host shows
//! attribute errors. Code-level knobs that the host never sees live in
//! [`ProviderOptions`].

use secrecy::SecretString;
use serde_json::Value;
use std::time::Duration;
use url::{Host, Url};

use crate::error::ProviderError;
use crate::schema::Diagnostic;

/// Provider attribute holding the Azure AD tenant id.
pub const ATTR_TENANT_ID: &str = "azure_tenant_id";
/// Provider attribute holding the app registration's client id.
pub const ATTR_CLIENT_ID: &str = "azure_client_id";
/// Provider attribute holding the app registration's client secret.
pub const ATTR_CLIENT_SECRET: &str = "azure_client_secret";
/// Provider attribute holding the registry API base URL.
pub const ATTR_REGISTRY_BASE_URL: &str = "registry_base_url";

/// Default Azure AD authority host.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Resource scope requested for registry access tokens.
///
/// This is the `.default` scope of the Application ID URI under which the
/// registry API is registered in Azure AD. A registry exposed under another
/// app registration needs its own scope via [`ProviderOptions::with_scopes`].
pub const DEFAULT_SCOPE: &str = "https://serko.co.nz/42f0101f-10b2-453c-87bd-8b3bcabbdc63/.default";

/// Timeout applied to every registry request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client-credential inputs for Azure AD.
#[derive(Debug)]
pub struct Credentials {
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Client secret. Redacted in `Debug` output.
    pub client_secret: SecretString,
}

/// Typed provider configuration.
#[derive(Debug)]
pub struct ProviderConfig {
    /// Credentials used to acquire the registry access token.
    pub credentials: Credentials,
    /// Base URL of the registry API; resource paths are appended to it.
    pub registry_base_url: Url,
}

impl ProviderConfig {
    /// Parse the host's provider configuration object.
    ///
    /// Inputs are checked in declaration order and the first problem is
    /// returned, so the user fixes one thing at a time.
    pub fn from_value(config: &Value) -> Result<Self, ProviderError> {
        if !config.is_object() {
            return Err(ProviderError::Configuration(
                "provider configuration must be an object".to_string(),
            ));
        }

        let tenant_id = required_string(config, ATTR_TENANT_ID)?;
        let client_id = required_string(config, ATTR_CLIENT_ID)?;
        let client_secret = required_string(config, ATTR_CLIENT_SECRET)?;
        let base_url = required_string(config, ATTR_REGISTRY_BASE_URL)?;

        Ok(Self {
            credentials: Credentials {
                tenant_id,
                client_id,
                client_secret: SecretString::from(client_secret),
            },
            registry_base_url: parse_base_url(&base_url)?,
        })
    }

    /// Non-fatal findings about an otherwise valid configuration.
    ///
    /// Plain `http` is accepted for loopback registries only; anywhere else
    /// the bearer token would cross the network unencrypted.
    pub fn warnings(&self) -> Vec<Diagnostic> {
        let url = &self.registry_base_url;
        let loopback = match url.host() {
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        };
        if url.scheme() == "http" && !loopback {
            vec![Diagnostic::warning("Registry base URL does not use HTTPS")
                .with_detail(format!(
                    "The access token will be sent unencrypted to {}",
                    url.host_str().unwrap_or_default()
                ))
                .with_attribute(ATTR_REGISTRY_BASE_URL)]
        } else {
            Vec::new()
        }
    }
}

fn required_string(config: &Value, attribute: &str) -> Result<String, ProviderError> {
    match config.get(attribute) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | Some(Value::Null) | None => Err(ProviderError::Configuration(
            format!("{} cannot be an empty string", attribute),
        )),
        Some(_) => Err(ProviderError::Configuration(format!(
            "{} must be a string",
            attribute
        ))),
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        ProviderError::Configuration(format!(
            "{} is not a valid URL: {}",
            ATTR_REGISTRY_BASE_URL, e
        ))
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ProviderError::Configuration(format!(
                "{} must use http or https, got {}",
                ATTR_REGISTRY_BASE_URL, other
            )))
        }
    }
    if url.cannot_be_a_base() {
        return Err(ProviderError::Configuration(format!(
            "{} cannot be used as a base URL",
            ATTR_REGISTRY_BASE_URL
        )));
    }
    Ok(url)
}

/// Convert a configuration error into the diagnostic shown by the host.
///
/// The attribute is attached when the message names one of the provider
/// attributes.
pub fn configuration_diagnostic(err: &ProviderError) -> Diagnostic {
    let message = err.message();
    let attribute = [
        ATTR_TENANT_ID,
        ATTR_CLIENT_ID,
        ATTR_CLIENT_SECRET,
        ATTR_REGISTRY_BASE_URL,
    ]
    .into_iter()
    .find(|attr| message.starts_with(attr));

    let summary = match attribute {
        Some(ATTR_TENANT_ID) => "Unable to find Azure Tenant Id",
        Some(ATTR_CLIENT_ID) => "Unable to find Azure Client Id",
        Some(ATTR_CLIENT_SECRET) => "Unable to find Azure Client Secret",
        Some(_) => "Unable to find registry base URL",
        None => "Invalid provider configuration",
    };

    let diagnostic = Diagnostic::error(summary).with_detail(message);
    match attribute {
        Some(attr) => diagnostic.with_attribute(attr),
        None => diagnostic,
    }
}

/// What to do when the access token cannot be acquired during configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthFailurePolicy {
    /// Return the failure to the host as an error.
    #[default]
    Propagate,
    /// Log the failure and terminate the process.
    Abort,
}

/// Options for the provider that are fixed in code rather than supplied by
/// the host.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Timeout for each token and registry request. Default: 10 seconds.
    pub request_timeout: Duration,
    /// Azure AD authority host. Default: [`DEFAULT_AUTHORITY`].
    pub authority: String,
    /// Scopes requested for the access token. Default: [`DEFAULT_SCOPE`].
    pub scopes: Vec<String>,
    /// Behaviour on token acquisition failure. Default: propagate.
    pub auth_failure_policy: AuthFailurePolicy,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            authority: DEFAULT_AUTHORITY.to_string(),
            scopes: vec![DEFAULT_SCOPE.to_string()],
            auth_failure_policy: AuthFailurePolicy::default(),
        }
    }
}

impl ProviderOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout for the token endpoint and the registry.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the authority host (e.g. a sovereign cloud or a test server).
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Replace the requested scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the auth failure policy.
    pub fn with_auth_failure_policy(mut self, policy: AuthFailurePolicy) -> Self {
        self.auth_failure_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    fn full_config() -> Value {
        json!({
            "azure_tenant_id": "tenant-1",
            "azure_client_id": "client-1",
            "azure_client_secret": "s3cr3t",
            "registry_base_url": "https://registry.example.com/api"
        })
    }

    #[test]
    fn test_plain_http_warns_unless_loopback() {
        let config = ProviderConfig::from_value(&full_config()).unwrap();
        assert!(config.warnings().is_empty());

        for base in ["http://127.0.0.1:8080", "http://localhost/api", "http://[::1]:9000"] {
            let mut value = full_config();
            value["registry_base_url"] = json!(base);
            let config = ProviderConfig::from_value(&value).unwrap();
            assert!(config.warnings().is_empty(), "{}", base);
        }

        let mut value = full_config();
        value["registry_base_url"] = json!("http://registry.example.com");
        let warnings = ProviderConfig::from_value(&value).unwrap().warnings();
        assert_eq!(warnings.len(), 1);
        assert!(!warnings[0].is_error());
        assert_eq!(warnings[0].attribute.as_deref(), Some(ATTR_REGISTRY_BASE_URL));
        assert!(warnings[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("registry.example.com"));
    }

    #[test]
    fn test_parse_full_config() {
        let config = ProviderConfig::from_value(&full_config()).unwrap();
        assert_eq!(config.credentials.tenant_id, "tenant-1");
        assert_eq!(config.credentials.client_id, "client-1");
        assert_eq!(config.credentials.client_secret.expose_secret(), "s3cr3t");
        assert_eq!(
            config.registry_base_url.as_str(),
            "https://registry.example.com/api"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ProviderConfig::from_value(&full_config()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("tenant-1"));
    }

    #[test]
    fn test_empty_inputs_rejected_in_order() {
        let mut config = full_config();
        config["azure_client_id"] = json!("");
        config["registry_base_url"] = json!("");

        let err = ProviderConfig::from_value(&config).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert_eq!(err.message(), "azure_client_id cannot be an empty string");
    }

    #[test]
    fn test_missing_and_whitespace_inputs_rejected() {
        let mut config = full_config();
        config
            .as_object_mut()
            .unwrap()
            .remove("azure_tenant_id");
        let err = ProviderConfig::from_value(&config).unwrap_err();
        assert!(err.message().starts_with("azure_tenant_id"));

        let mut config = full_config();
        config["azure_client_secret"] = json!("   ");
        let err = ProviderConfig::from_value(&config).unwrap_err();
        assert!(err.message().starts_with("azure_client_secret"));
    }

    #[test]
    fn test_non_string_input_rejected() {
        let mut config = full_config();
        config["azure_tenant_id"] = json!(42);
        let err = ProviderConfig::from_value(&config).unwrap_err();
        assert_eq!(err.message(), "azure_tenant_id must be a string");

        let err = ProviderConfig::from_value(&json!("nope")).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = full_config();
        config["registry_base_url"] = json!("registry.example.com");
        let err = ProviderConfig::from_value(&config).unwrap_err();
        assert!(err.message().contains("not a valid URL"));

        config["registry_base_url"] = json!("ftp://registry.example.com");
        let err = ProviderConfig::from_value(&config).unwrap_err();
        assert!(err.message().contains("http or https"));
    }

    #[test]
    fn test_configuration_diagnostic() {
        let err = ProviderError::Configuration(
            "azure_tenant_id cannot be an empty string".to_string(),
        );
        let diag = configuration_diagnostic(&err);
        assert_eq!(diag.summary, "Unable to find Azure Tenant Id");
        assert_eq!(diag.attribute.as_deref(), Some("azure_tenant_id"));

        let err = ProviderError::Configuration(
            "registry_base_url is not a valid URL: relative URL without a base".to_string(),
        );
        let diag = configuration_diagnostic(&err);
        assert_eq!(diag.summary, "Unable to find registry base URL");
        assert_eq!(diag.attribute.as_deref(), Some("registry_base_url"));

        let err = ProviderError::Configuration("provider configuration must be an object".into());
        let diag = configuration_diagnostic(&err);
        assert_eq!(diag.summary, "Invalid provider configuration");
        assert!(diag.attribute.is_none());
    }

    #[test]
    fn test_options_builder() {
        let options = ProviderOptions::new()
            .with_request_timeout(Duration::from_secs(3))
            .with_authority("http://127.0.0.1:9999")
            .with_scopes(["api://registry/.default"])
            .with_auth_failure_policy(AuthFailurePolicy::Abort);

        assert_eq!(options.request_timeout, Duration::from_secs(3));
        assert_eq!(options.authority, "http://127.0.0.1:9999");
        assert_eq!(options.scopes, vec!["api://registry/.default".to_string()]);
        assert_eq!(options.auth_failure_policy, AuthFailurePolicy::Abort);

        let defaults = ProviderOptions::default();
        assert_eq!(defaults.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(defaults.scopes, vec![DEFAULT_SCOPE.to_string()]);
        assert_eq!(defaults.auth_failure_policy, AuthFailurePolicy::Propagate);
    }
}
