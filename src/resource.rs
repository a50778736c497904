//! The `registry_resources` resource.
//!
//! Maps the host lifecycle onto the registry collection:
//!
//! | Operation | Request                          | Success |
//! |-----------|----------------------------------|---------|
//! | create    | `POST /resources` `{name}`       | 200     |
//! | read      | `GET /resources/{id}`            | 200     |
//! | update    | `PUT /resources` `{id, name}`    | 204     |
//! | delete    | `DELETE /resources/{id}`         | 204     |
//!
//! Any other status is a failure. Each call issues at most one request.

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::codec::{self, DeclaredResource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::transport::RegistryClient;
use crate::types::{AttributeChange, ImportedResource, LifecycleState, Operation, PlanResult};

/// Resource type name exposed to the host.
pub const RESOURCE_TYPE: &str = "registry_resources";

/// Collection path segment on the registry API.
pub const COLLECTION: &str = "resources";

/// Schema of the resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("A named resource held in the registry")
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Identifier assigned by the registry"),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the resource"),
        )
}

/// Plan a change.
///
/// Renaming is always an in-place update; the registry keeps the id.
pub fn plan(
    prior_state: Option<Value>,
    proposed_state: Value,
) -> Result<PlanResult, ProviderError> {
    let prior = prior_state.filter(|state| !state.is_null());

    match (prior, proposed_state) {
        (None, Value::Null) => Ok(PlanResult::no_change(Value::Null)),
        (None, proposed) => {
            let declared = DeclaredResource::from_state(&proposed, Operation::Plan)?;
            let name = Value::String(declared.name.clone());
            let planned = DeclaredResource::new(declared.name).into_state();
            Ok(PlanResult::with_changes(
                planned,
                vec![AttributeChange::added("name", name)],
                false,
            ))
        }
        (Some(prior), Value::Null) => {
            let changes = ["id", "name"]
                .into_iter()
                .filter_map(|attr| match prior.get(attr) {
                    Some(v) if !v.is_null() => Some(AttributeChange::removed(attr, v.clone())),
                    _ => None,
                })
                .collect();
            Ok(PlanResult::with_changes(Value::Null, changes, false))
        }
        (Some(prior), proposed) => {
            let id = DeclaredResource::id_from_state(&prior, Operation::Plan)?;
            let declared = DeclaredResource::from_state(&proposed, Operation::Plan)?;
            let prior_name = prior.get("name").cloned().unwrap_or(Value::Null);

            if prior_name.as_str() == Some(declared.name.as_str()) {
                return Ok(PlanResult::no_change(prior));
            }

            let after = Value::String(declared.name.clone());
            let planned = DeclaredResource {
                id,
                name: declared.name,
            }
            .into_state();
            Ok(PlanResult::with_changes(
                planned,
                vec![AttributeChange::modified("name", prior_name, after)],
                false,
            ))
        }
    }
}

/// Create the resource and return the registry's view of it.
#[instrument(skip_all, fields(resource_type = RESOURCE_TYPE, id))]
pub async fn create(client: &RegistryClient, planned_state: Value) -> Result<Value, ProviderError> {
    let declared = DeclaredResource::from_state(&planned_state, Operation::Create)?;
    LifecycleState::from_id(declared.id.as_deref()).transition(Operation::Create)?;

    let body = codec::encode_create(&declared)?;
    let response = client
        .send(Operation::Create, Method::POST, &[COLLECTION], Some(body))
        .await?
        .expect_status(Operation::Create, 200)?;

    let remote = codec::decode(&response.body, Operation::Create)?;
    tracing::Span::current().record("id", remote.id.as_str());
    info!(name = %remote.name, "Created registry resource");

    Ok(DeclaredResource::from(remote).into_state())
}

/// Refresh the resource from the registry.
///
/// A missing resource is reported as [`ProviderError::NotFound`].
#[instrument(skip_all, fields(resource_type = RESOURCE_TYPE, id))]
pub async fn read(client: &RegistryClient, current_state: Value) -> Result<Value, ProviderError> {
    let id = DeclaredResource::id_from_state(&current_state, Operation::Read)?;
    LifecycleState::from_id(id.as_deref()).transition(Operation::Read)?;
    let id = require_id(id, Operation::Read)?;
    tracing::Span::current().record("id", id.as_str());

    let remote = get(client, &id, Operation::Read).await?;
    debug!(name = %remote.name, "Read registry resource");

    Ok(DeclaredResource::from(remote).into_state())
}

/// Rename the resource in place.
///
/// The id always comes from prior state; the planned state is returned
/// as the new state once the registry acknowledges the update.
#[instrument(skip_all, fields(resource_type = RESOURCE_TYPE, id))]
pub async fn update(
    client: &RegistryClient,
    prior_state: Value,
    planned_state: Value,
) -> Result<Value, ProviderError> {
    let prior_id = DeclaredResource::id_from_state(&prior_state, Operation::Update)?;
    LifecycleState::from_id(prior_id.as_deref()).transition(Operation::Update)?;
    let prior_id = require_id(prior_id, Operation::Update)?;
    tracing::Span::current().record("id", prior_id.as_str());

    let mut declared = DeclaredResource::from_state(&planned_state, Operation::Update)?;
    if let Some(planned_id) = &declared.id {
        if *planned_id != prior_id {
            return Err(ProviderError::InvalidRequest(format!(
                "cannot update: id is assigned by the registry and cannot change from {} to {}",
                prior_id, planned_id
            )));
        }
    }
    declared.id = Some(prior_id);

    let body = codec::encode_update(&declared)?;
    client
        .send(Operation::Update, Method::PUT, &[COLLECTION], Some(body))
        .await?
        .expect_status(Operation::Update, 204)?;

    info!(name = %declared.name, "Updated registry resource");
    Ok(declared.into_state())
}

/// Delete the resource. No state remains afterwards.
#[instrument(skip_all, fields(resource_type = RESOURCE_TYPE, id))]
pub async fn delete(client: &RegistryClient, current_state: Value) -> Result<(), ProviderError> {
    let id = DeclaredResource::id_from_state(&current_state, Operation::Delete)?;
    LifecycleState::from_id(id.as_deref()).transition(Operation::Delete)?;
    let id = require_id(id, Operation::Delete)?;
    tracing::Span::current().record("id", id.as_str());

    client
        .send(Operation::Delete, Method::DELETE, &[COLLECTION, id.as_str()], None)
        .await?
        .expect_status(Operation::Delete, 204)?;

    info!("Deleted registry resource");
    Ok(())
}

/// Seed state for an existing registry resource.
///
/// No request is made; the name is filled in by the next read.
pub fn import(id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ProviderError::InvalidRequest(
            "cannot import: a non-empty resource id is required".to_string(),
        ));
    }
    LifecycleState::Unmanaged.transition(Operation::Import)?;

    Ok(vec![ImportedResource::new(
        RESOURCE_TYPE,
        serde_json::json!({ "id": id, "name": null }),
    )])
}

/// `GET /resources/{id}`, shared with the data source.
pub(crate) async fn get(
    client: &RegistryClient,
    id: &str,
    operation: Operation,
) -> Result<codec::RemoteResource, ProviderError> {
    let response = client
        .send(operation, Method::GET, &[COLLECTION, id], None)
        .await?;

    if response.status == 404 {
        return Err(ProviderError::NotFound {
            operation,
            message: format!("registry resource {} does not exist", id),
        });
    }

    let response = response.expect_status(operation, 200)?;
    codec::decode(&response.body, operation)
}

fn require_id(id: Option<String>, operation: Operation) -> Result<String, ProviderError> {
    id.ok_or_else(|| {
        ProviderError::FailedPrecondition(format!("cannot {} a resource without an id", operation))
    })
}
