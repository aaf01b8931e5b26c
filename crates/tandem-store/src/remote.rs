use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::{StoreError, StoreResult};
use crate::network::Operation;

/// Client for the service that confirms documents.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn query(&self, request: RemoteRequest) -> StoreResult<RemoteResponse>;
    async fn mutate(&self, request: RemoteRequest) -> StoreResult<RemoteResponse>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub document: String,
    pub variables: Value,
}

impl RemoteRequest {
    pub fn new(operation: &Operation, variables: Value) -> Self {
        Self {
            document: operation.document().to_string(),
            variables,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteErrorDetail {
    pub message: String,
}

/// Response envelope: optional data plus any errors the service reported.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RemoteErrorDetail>,
}

impl RemoteResponse {
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn with_errors<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: None,
            errors: messages
                .into_iter()
                .map(|m| RemoteErrorDetail { message: m.into() })
                .collect(),
        }
    }

    /// The document snapshot at `data[root][payload]`.
    ///
    /// Any reported error rejects the whole response, even alongside data.
    /// The payload may be an object or JSON text holding one.
    pub fn payload(self, operation: &Operation) -> StoreResult<Value> {
        if !self.errors.is_empty() {
            let errors: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            error!(operation = operation.root(), ?errors, "remote rejected request");
            return Err(StoreError::RemoteRejected {
                operation: operation.root().to_string(),
                errors,
            });
        }
        let empty = || {
            warn!(operation = operation.root(), "remote returned no data");
            StoreError::RemoteEmpty {
                operation: operation.root().to_string(),
            }
        };
        let mut data = self.data.ok_or_else(empty)?;
        let payload = data
            .get_mut(operation.root())
            .and_then(|root| root.get_mut(operation.payload()))
            .map(Value::take)
            .filter(|v| !v.is_null())
            .ok_or_else(empty)?;
        match payload {
            Value::String(text) => Ok(serde_json::from_str(&text)?),
            other => Ok(other),
        }
    }
}
