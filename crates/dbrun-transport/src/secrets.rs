//! Secret scope and key listing endpoints.

use std::sync::Arc;

use serde_json::{Value, json};

use dbrun_core::traits::{Transport, TransportError};

/// Typed client for `api/2.0/secrets/*`. Listing only; values are
/// never readable through this API.
pub struct SecretsClient {
    transport: Arc<dyn Transport>,
}

impl SecretsClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// List secret scope names.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn list_scopes(&self) -> Result<Vec<String>, TransportError> {
        let body = self.transport.get("api/2.0/secrets/scopes/list").await?;
        Ok(collect_names(&body, "scopes", "name"))
    }

    /// List secret key names within `scope`.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn list(&self, scope: &str) -> Result<Vec<String>, TransportError> {
        let body = self
            .transport
            .get_with("api/2.0/secrets/list", json!({ "scope": scope }))
            .await?;
        Ok(collect_names(&body, "secrets", "key"))
    }
}

fn collect_names(body: &Value, list_key: &str, field: &str) -> Vec<String> {
    body.get(list_key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(field).and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
