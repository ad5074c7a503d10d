//! Trait seams for HTTP transport and watch sinks.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Non-2xx response from the remote endpoint.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    /// Network-level or body-decode failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Authenticated HTTP access to a fixed remote host.
///
/// Paths are resolved against the transport's base host and responses
/// are parsed JSON bodies. No retries happen at this layer; the poll
/// loops above it own retry policy.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET request.
    async fn get(&self, path: &str) -> Result<Value, TransportError>;

    /// Issue a GET request with query arguments.
    ///
    /// `query` must be a flat JSON object; the status-polling and
    /// secret-list endpoints take their arguments this way.
    async fn get_with(&self, path: &str, query: Value) -> Result<Value, TransportError>;

    /// Issue a POST request with a JSON body.
    async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError>;
}

/// Incremental retrieval of a growing remote output artifact.
#[async_trait]
pub trait WatchSink: Send + Sync {
    /// Download the full current content of the artifact at `path`.
    async fn download(&self, path: &str) -> Result<Vec<u8>, TransportError>;
}
