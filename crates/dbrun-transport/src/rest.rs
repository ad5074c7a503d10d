//! Authenticated REST transport against the remote workspace host.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

use dbrun_core::traits::{Transport, TransportError};

/// Default request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Reqwest-backed [`Transport`] with bearer-token authentication.
///
/// Every failure path maps to [`TransportError`]; nothing at this
/// layer retries or panics.
pub struct RestClient {
    client: Client,
    host: String,
    token: String,
}

impl RestClient {
    /// Create a client for `host` authenticating with `token`.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            client,
            host: host.into(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Value, TransportError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        tracing::trace!(%status, "response received");
        match status {
            status if status.is_success() => response
                .json::<Value>()
                .await
                .map_err(|e| TransportError::Network(e.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(status_error(status, &body))
            }
        }
    }
}

#[async_trait]
impl Transport for RestClient {
    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.dispatch(self.client.get(self.url(path))).await
    }

    async fn get_with(&self, path: &str, query: Value) -> Result<Value, TransportError> {
        let request = self.client.get(self.url(path)).query(&query_pairs(&query));
        self.dispatch(request).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.dispatch(self.client.post(self.url(path)).json(&body))
            .await
    }
}

fn status_error(status: StatusCode, body: &str) -> TransportError {
    let reason = status.canonical_reason().unwrap_or("unknown");
    let message = if body.is_empty() {
        reason.to_string()
    } else {
        format!("{reason} - {body}")
    };
    TransportError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Render a flat JSON object as query parameters.
fn query_pairs(query: &Value) -> Vec<(String, String)> {
    match query {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = RestClient::new("https://example.com/", "t").unwrap();
        assert_eq!(
            client.url("/api/1.2/contexts/create"),
            "https://example.com/api/1.2/contexts/create"
        );
        assert_eq!(client.url("api/2.0/clusters/list"), "https://example.com/api/2.0/clusters/list");
    }

    #[test]
    fn test_query_pairs_renders_scalars() {
        let pairs = query_pairs(&json!({
            "clusterId": "c1",
            "offset": 1024,
        }));
        assert!(pairs.contains(&("clusterId".to_string(), "c1".to_string())));
        assert!(pairs.contains(&("offset".to_string(), "1024".to_string())));
    }

    #[test]
    fn test_status_error_carries_reason_and_body() {
        let err = status_error(StatusCode::NOT_FOUND, "no such context");
        assert_eq!(
            err.to_string(),
            "request failed with status 404: Not Found - no such context"
        );

        let bare = status_error(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(
            bare.to_string(),
            "request failed with status 500: Internal Server Error"
        );
    }
}
