//! Conversion between the registry wire format and host state.
//!
//! The registry speaks `{"id": "...", "name": "..."}`. The host holds the
//! same two fields, with `id` unset until the registry assigns one.
//! Decoding is strict: missing or mistyped fields are errors, never
//! defaults. An empty `id` is rejected. Unknown extra fields are ignored.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::types::Operation;

/// A resource as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// Server-assigned identifier. Immutable, never empty.
    #[serde(deserialize_with = "non_empty")]
    pub id: String,
    /// User-declared name.
    pub name: String,
}

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        return Err(D::Error::custom("id must not be empty"));
    }
    Ok(value)
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    id: &'a str,
    name: &'a str,
}

/// A resource as held in host state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredResource {
    /// Remote id; `None` before the resource is created.
    pub id: Option<String>,
    /// User-declared name.
    pub name: String,
}

impl DeclaredResource {
    /// A resource that has not yet been created.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Parse a host state object handed to `operation`.
    ///
    /// `id` may be absent, null or a string; `name` must be a string.
    pub fn from_state(state: &Value, operation: Operation) -> Result<Self, ProviderError> {
        let obj = state.as_object().ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "cannot {}: resource state must be an object",
                operation
            ))
        })?;

        let id = Self::id_from_state(state, operation)?;
        let name = match obj.get("name") {
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(ProviderError::InvalidRequest(format!(
                    "cannot {}: attribute 'name' must be a string",
                    operation
                )))
            }
        };

        Ok(Self { id, name })
    }

    /// Extract only the remote id from a host state object.
    ///
    /// Imported state carries an id and a null name until the first read,
    /// so callers that only need the id use this instead of
    /// [`from_state`](Self::from_state).
    pub fn id_from_state(
        state: &Value,
        operation: Operation,
    ) -> Result<Option<String>, ProviderError> {
        match state.get("id") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ProviderError::InvalidRequest(format!(
                "cannot {}: attribute 'id' must be a string",
                operation
            ))),
        }
    }

    /// Render as a host state object.
    pub fn into_state(self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
        })
    }

    /// The remote id, or a precondition error naming `operation`.
    pub fn require_id(&self, operation: Operation) -> Result<&str, ProviderError> {
        self.id.as_deref().ok_or_else(|| {
            ProviderError::FailedPrecondition(format!(
                "cannot {} a resource without an id",
                operation
            ))
        })
    }
}

impl From<RemoteResource> for DeclaredResource {
    fn from(remote: RemoteResource) -> Self {
        Self {
            id: Some(remote.id),
            name: remote.name,
        }
    }
}

/// Body for `POST /resources`.
pub fn encode_create(resource: &DeclaredResource) -> Result<Vec<u8>, ProviderError> {
    Ok(serde_json::to_vec(&CreateRequest {
        name: &resource.name,
    })?)
}

/// Body for `PUT /resources`. The resource must carry an id.
pub fn encode_update(resource: &DeclaredResource) -> Result<Vec<u8>, ProviderError> {
    let id = resource.require_id(Operation::Update)?;
    Ok(serde_json::to_vec(&UpdateRequest {
        id,
        name: &resource.name,
    })?)
}

/// Serialize a registry resource.
pub fn encode(resource: &RemoteResource) -> Result<Vec<u8>, ProviderError> {
    Ok(serde_json::to_vec(resource)?)
}

/// Parse a registry response body for `operation`.
pub fn decode(body: &[u8], operation: Operation) -> Result<RemoteResource, ProviderError> {
    serde_json::from_slice(body).map_err(|source| ProviderError::Decode { operation, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_create_sends_name_only() {
        let body = encode_create(&DeclaredResource::new("widget")).unwrap();
        assert_eq!(body, br#"{"name":"widget"}"#);
    }

    #[test]
    fn test_encode_update() {
        let resource = DeclaredResource {
            id: Some("abc-1".to_string()),
            name: "gadget".to_string(),
        };
        let body = encode_update(&resource).unwrap();
        assert_eq!(body, br#"{"id":"abc-1","name":"gadget"}"#);

        let err = encode_update(&DeclaredResource::new("gadget")).unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[test]
    fn test_decode() {
        let remote = decode(br#"{"id":"abc-1","name":"widget"}"#, Operation::Create).unwrap();
        assert_eq!(remote.id, "abc-1");
        assert_eq!(remote.name, "widget");

        // Extra fields are tolerated
        let remote = decode(
            br#"{"id":"abc-1","name":"widget","createdAt":"2024-01-01"}"#,
            Operation::Read,
        )
        .unwrap();
        assert_eq!(remote.name, "widget");
    }

    #[test]
    fn test_decode_rejects_incomplete_bodies() {
        for body in [
            &br#"{"name":"widget"}"#[..],
            br#"{"id":"abc-1"}"#,
            br#"{"id":1,"name":"widget"}"#,
            br#"{"id":"abc-1","name":null}"#,
            br#"{"id":"","name":"widget"}"#,
            b"",
            b"not json",
        ] {
            let err = decode(body, Operation::Read).unwrap_err();
            assert!(
                matches!(err, ProviderError::Decode { operation: Operation::Read, .. }),
                "body {:?} gave {:?}",
                String::from_utf8_lossy(body),
                err
            );
        }
    }

    #[test]
    fn test_names_with_quotes_and_unicode_survive() {
        for name in [r#"say "hi""#, "caf\u{e9} \u{1f980}", "back\\slash", "\"\""] {
            let remote = RemoteResource {
                id: "abc-1".to_string(),
                name: name.to_string(),
            };
            let bytes = encode(&remote).unwrap();
            assert_eq!(decode(&bytes, Operation::Read).unwrap(), remote);

            let state = DeclaredResource::from(remote.clone()).into_state();
            assert_eq!(state["name"], name);
            let declared = DeclaredResource::from_state(&state, Operation::Read).unwrap();
            assert_eq!(declared.name, name);
        }
    }

    #[test]
    fn test_state_conversion() {
        let op = Operation::Create;
        let declared = DeclaredResource::from_state(&json!({"name": "widget"}), op).unwrap();
        assert_eq!(declared, DeclaredResource::new("widget"));

        let declared =
            DeclaredResource::from_state(&json!({"id": null, "name": "widget"}), op).unwrap();
        assert!(declared.id.is_none());
        assert_eq!(declared.into_state(), json!({"id": null, "name": "widget"}));

        let state = json!({"id": "abc-1", "name": "widget"});
        let declared = DeclaredResource::from_state(&state, Operation::Read).unwrap();
        assert_eq!(declared.require_id(Operation::Read).unwrap(), "abc-1");

        assert!(DeclaredResource::from_state(&json!({"id": "abc-1"}), op).is_err());
        assert_eq!(
            DeclaredResource::id_from_state(&json!({"id": "abc-1", "name": null}), op).unwrap(),
            Some("abc-1".to_string())
        );
        assert!(DeclaredResource::from_state(&json!({"id": 7, "name": "w"}), op).is_err());

        let err = DeclaredResource::from_state(&json!("widget"), Operation::Update).unwrap_err();
        assert!(err.message().starts_with("cannot update:"), "{}", err);
    }
}
