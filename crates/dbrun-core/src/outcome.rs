//! Tri-state result model for remote operations.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::Value;

/// Payload carried by a successful operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain text output.
    Text(String),
    /// Tabular output: row data plus the reported schema.
    Table { data: Value, schema: Value },
    /// File references for image output.
    Images { files: Vec<String> },
}

/// Result of a remote operation.
///
/// Only `Success` carries a structured payload. `Failure` is a
/// human-readable cause; `Warning` marks a benign non-success such as
/// a deliberate cancellation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Payload),
    Failure(String),
    Warning(String),
}

impl Outcome {
    /// Success wrapping a plain-text payload.
    #[must_use]
    pub fn success_text(data: impl Into<String>) -> Self {
        Self::Success(Payload::Text(data.into()))
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(_))
    }

    /// Payload of a success, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure(_) | Self::Warning(_) => None,
        }
    }

    /// Message of a failure or warning.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(msg) | Self::Warning(msg) => Some(msg),
        }
    }

    /// Render the outcome as a string.
    ///
    /// Text payloads yield their content, tables render their data as
    /// JSON, image payloads list one file per line, and failures and
    /// warnings yield their message.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Success(Payload::Text(s)) => s.clone(),
            Self::Success(Payload::Table { data, .. }) => data.to_string(),
            Self::Success(Payload::Images { files }) => files.join("\n"),
            Self::Failure(msg) | Self::Warning(msg) => msg.clone(),
        }
    }

    /// Render the outcome as a string, treating the content as
    /// base64-encoded bytes.
    ///
    /// Decode and UTF-8 failures degrade to an empty string and log
    /// through `tracing::error!`; this accessor never panics.
    #[must_use]
    pub fn decoded_text(&self) -> String {
        let encoded = self.text();
        match BASE64.decode(encoded.as_bytes()) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("decoded payload is not valid UTF-8: {e}");
                    String::new()
                }
            },
            Err(e) => {
                tracing::error!("failed to decode base64 payload: {e}");
                String::new()
            }
        }
    }
}
