//! Convenience types shared between the provider and its host.
//!
//! These cover planning results, imports, provider metadata and the
//! per-instance lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProviderError;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if deleting).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(
        path: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: serde_json::Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata: the resource and data source names it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}

/// A lifecycle operation requested by the host.
///
/// Used to label errors and diagnostics so every failure names the verb
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Provider configuration (token acquisition).
    Configure,
    /// Plan a change.
    Plan,
    /// Create a resource.
    Create,
    /// Refresh a resource from the remote service.
    Read,
    /// Update a resource in place.
    Update,
    /// Delete a resource.
    Delete,
    /// Import an existing resource by id.
    Import,
    /// Read the data source.
    ReadDataSource,
}

impl Operation {
    /// Lowercase verb used in messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Plan => "plan",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Import => "import",
            Self::ReadDataSource => "read data source",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one resource instance.
///
/// ```text
/// Unmanaged --create/import--> Created --update--> Modified
///     any   --delete--> Deleted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Not yet tracked; no remote id known.
    Unmanaged,
    /// Created (or imported) and holding a remote id.
    Created,
    /// Updated at least once after creation.
    Modified,
    /// Removed remotely; no state remains.
    Deleted,
}

impl LifecycleState {
    /// Derive the state of an instance from whether it carries a remote id.
    pub fn from_id(id: Option<&str>) -> Self {
        match id {
            Some(id) if !id.is_empty() => Self::Created,
            _ => Self::Unmanaged,
        }
    }

    /// Apply `operation`, returning the next state or a precondition error.
    pub fn transition(self, operation: Operation) -> Result<Self, ProviderError> {
        use LifecycleState::*;

        let next = match (self, operation) {
            (Unmanaged, Operation::Create | Operation::Import) => Created,
            (Created | Modified, Operation::Update) => Modified,
            (Created | Modified, Operation::Read | Operation::ReadDataSource) => self,
            (Created | Modified, Operation::Delete) => Deleted,
            (state, Operation::Plan | Operation::Configure) => state,
            (state, op) => {
                return Err(ProviderError::FailedPrecondition(format!(
                    "cannot {} a resource in state {:?}",
                    op, state
                )))
            }
        };
        Ok(next)
    }
}
