//! Error types for the registry provider.

use thiserror::Error;

use crate::schema::Diagnostic;
use crate::types::Operation;

/// Errors that can occur while configuring the provider or running a
/// resource operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A required provider input is missing, empty or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The access token could not be acquired.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The request could not be built or sent, or no response arrived in time.
    #[error("Transport error during {operation}: {source}")]
    Transport {
        /// The operation that issued the request.
        operation: Operation,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The registry answered with a status outside the expected one.
    #[error("Unexpected status during {operation}: expected {expected}, got {status}{}", format_body(.body))]
    UnexpectedStatus {
        /// The operation that issued the request.
        operation: Operation,
        /// The status code the operation requires.
        expected: u16,
        /// The status code received.
        status: u16,
        /// The response body, if any.
        body: String,
    },

    /// The response body was not a valid resource representation.
    #[error("Decode error during {operation}: {source}")]
    Decode {
        /// The operation whose response failed to decode.
        operation: Operation,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The requested resource was not found.
    #[error("Resource not found during {operation}: {message}")]
    NotFound {
        /// The operation that looked the resource up.
        operation: Operation,
        /// What was missing.
        message: String,
    },

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred at the host boundary.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider was stopped while the request was in flight.
    #[error("Cancelled during {operation}: {message}")]
    Cancelled {
        /// The operation that was interrupted.
        operation: Operation,
        /// Why it was interrupted.
        message: String,
    },
}

fn format_body(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(" ({})", body)
    }
}

impl ProviderError {
    /// The error for `operation` being interrupted by `stop()`.
    pub fn cancelled(operation: Operation) -> Self {
        Self::Cancelled {
            operation,
            message: "abandoned because the provider is stopping".to_string(),
        }
    }

    /// Get the error message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Configuration(msg)
            | Self::Auth(msg)
            | Self::Validation(msg)
            | Self::UnknownResource(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::NotFound { message, .. } | Self::Cancelled { message, .. } => message.clone(),
            Self::Transport { source, .. } => source.to_string(),
            Self::Decode { source, .. } => source.to_string(),
            Self::Serialization(err) => err.to_string(),
            Self::UnexpectedStatus {
                expected,
                status,
                body,
                ..
            } => format!("expected status {}, got {}{}", expected, status, format_body(body)),
        }
    }

    /// The operation this error is attached to, when known.
    ///
    /// Configuration and authentication failures only arise from configure,
    /// and validation failures only from plan. Precondition and request
    /// errors name their operation in the message instead.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Transport { operation, .. }
            | Self::UnexpectedStatus { operation, .. }
            | Self::Decode { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Cancelled { operation, .. } => Some(*operation),
            Self::Configuration(_) | Self::Auth(_) => Some(Operation::Configure),
            Self::Validation(_) => Some(Operation::Plan),
            _ => None,
        }
    }

    /// Whether the error came from a timed-out request.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }

    /// Render the error as an error diagnostic for `operation`.
    ///
    /// The summary names the failing operation; the detail carries the cause.
    pub fn into_diagnostic(self, operation: Operation) -> Diagnostic {
        Diagnostic::error(format!("Registry resource {} failed", operation))
            .with_detail(self.to_string())
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        match err.operation() {
            Some(operation) => err.into_diagnostic(operation),
            None => Diagnostic::error(err.to_string()),
        }
    }
}
