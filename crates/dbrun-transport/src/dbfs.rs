//! DBFS file endpoints and the production watch sink.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value, json};

use dbrun_core::traits::{Transport, TransportError, WatchSink};

/// Block size for streaming uploads, measured on the encoded form.
const UPLOAD_BLOCK_BYTES: usize = 500 * 1024;
/// Window size for incremental reads.
const READ_WINDOW_BYTES: usize = 1024 * 1024;

/// Typed client for `api/2.0/dbfs/*`.
///
/// Doubles as the production [`WatchSink`]: command output redirected
/// to a DBFS file is downloaded through `read`.
pub struct DbfsClient {
    transport: Arc<dyn Transport>,
}

impl DbfsClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Open a streaming upload and return its handle.
    ///
    /// # Errors
    /// Returns an error on transport failure or a missing handle.
    pub async fn create(&self, path: &str, overwrite: bool) -> Result<i64, TransportError> {
        let body = self
            .transport
            .post(
                "api/2.0/dbfs/create",
                json!({ "path": path, "overwrite": overwrite }),
            )
            .await?;
        body.get("handle")
            .and_then(Value::as_i64)
            .ok_or_else(|| TransportError::Network("create response missing handle".to_string()))
    }

    /// Append one base64-encoded block to an open upload.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn add_block(&self, handle: i64, block: &str) -> Result<(), TransportError> {
        self.transport
            .post(
                "api/2.0/dbfs/add-block",
                json!({ "handle": handle, "data": block }),
            )
            .await?;
        Ok(())
    }

    /// Close an open upload.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn close(&self, handle: i64) -> Result<(), TransportError> {
        self.transport
            .post("api/2.0/dbfs/close", json!({ "handle": handle }))
            .await?;
        Ok(())
    }

    /// Upload `content` to `path`, overwriting, in encoded blocks.
    ///
    /// # Errors
    /// Returns an error if any step of the create/add-block/close
    /// sequence fails; partial uploads are left to the remote to
    /// expire.
    pub async fn upload(&self, path: &str, content: &[u8]) -> Result<(), TransportError> {
        let handle = self.create(path, true).await?;
        let encoded = BASE64.encode(content);
        // base64 output is ASCII, so byte chunks stay valid strings
        for block in encoded.as_bytes().chunks(UPLOAD_BLOCK_BYTES) {
            let block = std::str::from_utf8(block)
                .map_err(|e| TransportError::Network(e.to_string()))?;
            self.add_block(handle, block).await?;
        }
        self.close(handle).await
    }

    /// Whether a file or directory exists at `path`.
    ///
    /// # Errors
    /// Returns an error on network failure; a status error from the
    /// remote means the path is absent.
    pub async fn exists(&self, path: &str) -> Result<bool, TransportError> {
        match self
            .transport
            .get_with("api/2.0/dbfs/get-status", json!({ "path": path }))
            .await
        {
            Ok(_) => Ok(true),
            Err(TransportError::Status { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a directory, including parents.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn mkdirs(&self, path: &str) -> Result<(), TransportError> {
        self.transport
            .post("api/2.0/dbfs/mkdirs", json!({ "path": path }))
            .await?;
        Ok(())
    }

    /// Download the full content at `path`.
    ///
    /// Reads window by window until the remote reports zero bytes.
    ///
    /// # Errors
    /// Returns an error on transport failure or undecodable content.
    pub async fn read(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        let mut content = Vec::new();
        let mut offset = 0u64;
        loop {
            let body = self
                .transport
                .get_with(
                    "api/2.0/dbfs/read",
                    json!({ "path": path, "offset": offset, "length": READ_WINDOW_BYTES }),
                )
                .await?;
            let bytes_read = body.get("bytes_read").and_then(Value::as_u64).unwrap_or(0);
            if bytes_read == 0 {
                break;
            }
            let data = body.get("data").and_then(Value::as_str).unwrap_or("");
            let decoded = BASE64
                .decode(data)
                .map_err(|e| TransportError::Network(e.to_string()))?;
            content.extend_from_slice(&decoded);
            offset += bytes_read;
        }
        Ok(content)
    }
}

#[async_trait]
impl WatchSink for DbfsClient {
    async fn download(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        self.read(path).await
    }
}
