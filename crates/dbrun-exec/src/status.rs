//! Wire types and terminal classification for the command protocol.

use serde::Deserialize;
use serde_json::Value;

use dbrun_core::{Outcome, Payload};

/// Cause marker the remote attaches to user-cancelled commands.
pub(crate) const CANCELLED_CAUSE_MARKER: &str = "CommandCancelledException";

/// Benign cause markers that never surface to callers.
///
/// Causes mentioning the internal variable-inspector helper are
/// registration artifacts, not user errors. Keep this list narrow so
/// genuine errors are never hidden.
pub(crate) const SUPPRESSED_CAUSE_MARKERS: &[&str] = &["__DB_Var_Explorer__"];

/// Remote execution-context states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContextState {
    Pending,
    Running,
    Error,
    Other,
}

impl ContextState {
    pub(crate) fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }
}

/// Remote command states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandState {
    Queued,
    Running,
    Cancelling,
    Finished,
    Cancelled,
    Other,
}

impl CommandState {
    pub(crate) fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "cancelling" => Self::Cancelling,
            "finished" => Self::Finished,
            "cancelled" => Self::Cancelled,
            _ => Self::Other,
        }
    }

    /// Whether the poll loop should keep waiting.
    pub(crate) const fn is_in_flight(self) -> bool {
        matches!(self, Self::Queued | Self::Running | Self::Cancelling)
    }
}

/// Body of the context status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContextStatusResponse {
    #[serde(default)]
    pub status: String,
}

/// Body of the command status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommandStatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub results: Option<CommandResults>,
}

/// Results block of a terminal command.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommandResults {
    #[serde(default)]
    pub result_type: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub cause: Option<String>,
    #[serde(default)]
    pub file_names: Option<Vec<String>>,
}

/// Map a terminal command status response onto an outcome.
pub(crate) fn classify(response: &CommandStatusResponse) -> Outcome {
    match CommandState::parse(&response.status) {
        CommandState::Finished => classify_results(response.results.as_ref()),
        CommandState::Cancelled => Outcome::Failure("Command execution cancelled".to_string()),
        _ => Outcome::Failure("Command execution failed".to_string()),
    }
}

fn classify_results(results: Option<&CommandResults>) -> Outcome {
    let Some(results) = results else {
        return Outcome::Failure("Command execution failed".to_string());
    };
    match results.result_type.as_str() {
        "error" => {
            let cause = results.cause.clone().unwrap_or_default();
            if cause.contains(CANCELLED_CAUSE_MARKER) {
                return Outcome::Warning("Command cancelled".to_string());
            }
            if SUPPRESSED_CAUSE_MARKERS.iter().any(|m| cause.contains(m)) {
                tracing::debug!("suppressing benign remote error: {cause}");
                return Outcome::success_text("");
            }
            Outcome::Failure(cause)
        }
        "table" => Outcome::Success(Payload::Table {
            data: results.data.clone().unwrap_or(Value::Null),
            schema: results.schema.clone().unwrap_or(Value::Null),
        }),
        "images" => Outcome::Success(Payload::Images {
            files: results.file_names.clone().unwrap_or_default(),
        }),
        _ => Outcome::success_text(render_text(results.data.as_ref())),
    }
}

fn render_text(data: Option<&Value>) -> String {
    match data {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
