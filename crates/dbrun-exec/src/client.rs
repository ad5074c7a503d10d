//! Remote execution-context protocol client.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::oneshot;

use dbrun_core::{ConnectionInfo, Outcome, Transport, TransportError};

use crate::status::{self, CommandState, CommandStatusResponse, ContextState, ContextStatusResponse};
use crate::watch::Watch;

/// Poll loop configuration.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Sleep between context status polls.
    pub context_interval: Duration,
    /// Sleep between command status polls.
    pub command_interval: Duration,
    /// Maximum poll iterations before giving up. `None` polls until a
    /// terminal state is observed.
    pub max_attempts: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            context_interval: Duration::from_secs(1),
            command_interval: Duration::from_millis(100),
            max_attempts: None,
        }
    }
}

/// Protocol error. Public operations fold these into [`Outcome`]
/// values; nothing crosses the public boundary as an `Err` or a
/// panic.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("No context")]
    NoContext,
    #[error("Poll interrupted")]
    Interrupted,
    #[error("No terminal state after {0} polls")]
    Exhausted(u32),
    #[error("Malformed response: {0}")]
    Protocol(String),
}

/// Protocol client owning one remote execution context.
///
/// Holds at most one in-flight command. `execute` takes `&mut self`,
/// so overlapping submissions on one client do not compile; shared
/// callers serialize through the session registry's per-session lock.
pub struct ExecutionClient {
    transport: Arc<dyn Transport>,
    info: ConnectionInfo,
    poll: PollSettings,
    context_id: Option<String>,
    command_id: Option<String>,
    execution_counter: u64,
    interrupt_rx: Option<oneshot::Receiver<()>>,
}

impl ExecutionClient {
    /// Create a client with default poll settings.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, info: ConnectionInfo) -> Self {
        Self::with_poll_settings(transport, info, PollSettings::default())
    }

    /// Create a client with explicit poll settings.
    #[must_use]
    pub fn with_poll_settings(
        transport: Arc<dyn Transport>,
        info: ConnectionInfo,
        poll: PollSettings,
    ) -> Self {
        Self {
            transport,
            info,
            poll,
            context_id: None,
            command_id: None,
            execution_counter: 0,
            interrupt_rx: None,
        }
    }

    /// Connection parameters this client was created with.
    #[must_use]
    pub const fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Remote context id, once created.
    #[must_use]
    pub fn context_id(&self) -> Option<&str> {
        self.context_id.as_deref()
    }

    /// Number of `execute` calls issued so far. Sequence labeling
    /// only, not a correctness input.
    #[must_use]
    pub const fn execution_counter(&self) -> u64 {
        self.execution_counter
    }

    /// Arm the interrupt handle for this client.
    ///
    /// Firing the returned sender aborts the in-flight poll loop with
    /// a failure. Re-arming replaces any previous handle.
    pub fn interrupt_handle(&mut self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.interrupt_rx = Some(rx);
        tx
    }

    /// Create the remote execution context and wait for it to start.
    pub async fn create_context(&mut self) -> Outcome {
        match self.try_create_context().await {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Failure(e.to_string()),
        }
    }

    async fn try_create_context(&mut self) -> Result<Outcome, ExecutionError> {
        let body = json!({
            "language": self.info.language.as_str(),
            "clusterId": self.info.cluster_id,
        });
        let created = self.transport.post("api/1.2/contexts/create", body).await?;
        let context_id = required_str(&created, "id")?;
        tracing::debug!(%context_id, "remote context created");
        self.context_id = Some(context_id.clone());

        let query = json!({
            "clusterId": self.info.cluster_id,
            "contextId": context_id,
        });
        let mut attempts = 0u32;
        loop {
            let body = self
                .transport
                .get_with("api/1.2/contexts/status", query.clone())
                .await?;
            let response: ContextStatusResponse = parse_body(body)?;
            let state = ContextState::parse(&response.status);
            if state != ContextState::Pending {
                return Ok(if state == ContextState::Running {
                    Outcome::success_text(format!(
                        "Execution Context created for profile '{}' and cluster '{}'",
                        self.info.profile, self.info.cluster_id
                    ))
                } else {
                    Outcome::Failure(format!(
                        "Execution context creation failed with status '{}'",
                        response.status
                    ))
                });
            }
            attempts += 1;
            self.check_budget(attempts)?;
            self.pause(self.poll.context_interval).await?;
        }
    }

    /// Submit `code` and poll to a terminal state.
    ///
    /// With a watch, each poll iteration feeds incremental output into
    /// the watch's store; without one, iterations emit trace ticks.
    pub async fn execute(&mut self, code: &str, watch: Option<&mut Watch>) -> Outcome {
        match self.try_execute(code, watch).await {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Failure(e.to_string()),
        }
    }

    async fn try_execute(
        &mut self,
        code: &str,
        mut watch: Option<&mut Watch>,
    ) -> Result<Outcome, ExecutionError> {
        let context_id = self.context_id.clone().ok_or(ExecutionError::NoContext)?;

        let body = json!({
            "language": self.info.language.as_str(),
            "clusterId": self.info.cluster_id,
            "contextId": context_id,
            "command": code,
        });
        let submitted = self.transport.post("api/1.2/commands/execute", body).await?;
        let command_id = required_str(&submitted, "id")?;
        self.command_id = Some(command_id.clone());
        self.execution_counter += 1;
        tracing::debug!(%command_id, counter = self.execution_counter, "command submitted");

        let query = json!({
            "clusterId": self.info.cluster_id,
            "contextId": context_id,
            "commandId": command_id,
        });
        let mut attempts = 0u32;
        let response = loop {
            let body = self
                .transport
                .get_with("api/1.2/commands/status", query.clone())
                .await?;
            let response: CommandStatusResponse = parse_body(body)?;
            if !CommandState::parse(&response.status).is_in_flight() {
                break response;
            }
            if let Some(watch) = watch.as_deref_mut() {
                watch.tick().await;
            } else {
                tracing::trace!("command still in flight");
            }
            attempts += 1;
            self.check_budget(attempts)?;
            self.pause(self.poll.command_interval).await?;
        };

        // One last download so output appended between the final two
        // status polls is not lost.
        if let Some(watch) = watch.as_deref_mut() {
            watch.tick().await;
            watch.finish();
        }
        Ok(status::classify(&response))
    }

    /// Ask the remote to cancel the in-flight command.
    ///
    /// Reports success on transport success without verifying the
    /// command actually stopped; the `execute` poll loop observes the
    /// eventual terminal state and resolves accordingly.
    pub async fn cancel(&mut self) -> Outcome {
        match self.try_cancel().await {
            Ok(()) => Outcome::success_text("Command cancelled"),
            Err(e) => Outcome::Failure(e.to_string()),
        }
    }

    async fn try_cancel(&mut self) -> Result<(), ExecutionError> {
        let context_id = self.context_id.clone().ok_or(ExecutionError::NoContext)?;
        let body = json!({
            "clusterId": self.info.cluster_id,
            "contextId": context_id,
            "commandId": self.command_id.clone().unwrap_or_default(),
        });
        self.transport.post("api/1.2/commands/cancel", body).await?;
        Ok(())
    }

    /// Destroy the remote context.
    ///
    /// On failure the context id is kept, so the session stays usable
    /// for a retry and remains registered.
    pub async fn stop(&mut self) -> Outcome {
        match self.try_stop().await {
            Ok(()) => Outcome::success_text("Execution context stopped"),
            Err(e) => Outcome::Failure(e.to_string()),
        }
    }

    async fn try_stop(&mut self) -> Result<(), ExecutionError> {
        let context_id = self.context_id.clone().ok_or(ExecutionError::NoContext)?;
        let body = json!({
            "clusterId": self.info.cluster_id,
            "contextId": context_id,
        });
        self.transport
            .post("api/1.2/contexts/destroy", body)
            .await?;
        self.context_id = None;
        self.command_id = None;
        Ok(())
    }

    fn check_budget(&self, attempts: u32) -> Result<(), ExecutionError> {
        match self.poll.max_attempts {
            Some(max) if attempts >= max => Err(ExecutionError::Exhausted(attempts)),
            _ => Ok(()),
        }
    }

    async fn pause(&mut self, interval: Duration) -> Result<(), ExecutionError> {
        let Some(mut rx) = self.interrupt_rx.take() else {
            tokio::time::sleep(interval).await;
            return Ok(());
        };
        tokio::select! {
            res = &mut rx => {
                match res {
                    Ok(()) => Err(ExecutionError::Interrupted),
                    // Handle dropped without firing; plain sleeps from here on.
                    Err(_) => {
                        tokio::time::sleep(interval).await;
                        Ok(())
                    }
                }
            }
            () = tokio::time::sleep(interval) => {
                self.interrupt_rx = Some(rx);
                Ok(())
            }
        }
    }
}

fn required_str(body: &Value, key: &str) -> Result<String, ExecutionError> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExecutionError::Protocol(format!("response missing '{key}'")))
}

fn parse_body<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, ExecutionError> {
    serde_json::from_value(body).map_err(|e| ExecutionError::Protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbrun_core::testing::{Method, ScriptedSink, ScriptedTransport};
    use dbrun_core::{Language, OutputStore, Payload, WatchEvent, WatchSink};

    fn info() -> ConnectionInfo {
        ConnectionInfo::new("p", "https://h.example", "c1", "analytics", Language::Python)
    }

    fn client(transport: &Arc<ScriptedTransport>) -> ExecutionClient {
        ExecutionClient::new(
            Arc::clone(transport) as Arc<dyn Transport>,
            info(),
        )
    }

    fn scripted_context(transport: &ScriptedTransport) {
        transport.push_ok(json!({"id": "42"}));
        transport.push_ok(json!({"status": "Running"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_context_reports_profile_and_cluster() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({"id": "42"}));
        transport.push_ok(json!({"status": "PENDING"}));
        transport.push_ok(json!({"status": "Running"}));

        let mut client = client(&transport);
        let outcome = client.create_context().await;

        assert_eq!(
            outcome,
            Outcome::success_text("Execution Context created for profile 'p' and cluster 'c1'")
        );
        assert_eq!(client.context_id(), Some("42"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_context_polls_once_per_status() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({"id": "42"}));
        transport.push_ok(json!({"status": "Pending"}));
        transport.push_ok(json!({"status": "Pending"}));
        transport.push_ok(json!({"status": "Running"}));

        let mut client = client(&transport);
        assert!(client.create_context().await.is_success());
        assert_eq!(transport.calls_to("api/1.2/contexts/status"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_context_error_status_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({"id": "42"}));
        transport.push_ok(json!({"status": "Error"}));

        let mut client = client(&transport);
        let outcome = client.create_context().await;
        assert!(outcome.is_failure());
        assert!(outcome.text().contains("Error"));
    }

    #[tokio::test]
    async fn test_create_context_transport_failure_is_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_err(TransportError::Status {
            status: 403,
            message: "Forbidden - bad token".to_string(),
        });

        let mut client = client(&transport);
        let outcome = client.create_context().await;
        assert!(outcome.is_failure());
        assert!(outcome.text().contains("403"));
    }

    #[tokio::test]
    async fn test_execute_without_context_makes_no_network_call() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut client = client(&transport);

        let outcome = client.execute("1+1", None).await;
        assert_eq!(outcome, Outcome::Failure("No context".to_string()));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_text_result() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_ok(json!({"id": "7"}));
        transport.push_ok(json!({"status": "Queued"}));
        transport.push_ok(json!({
            "status": "Finished",
            "results": {"resultType": "text", "data": "2"}
        }));

        let mut client = client(&transport);
        client.create_context().await;
        let outcome = client.execute("1+1", None).await;

        assert_eq!(outcome, Outcome::success_text("2"));
        assert_eq!(client.execution_counter(), 1);

        let execute_call = &transport.calls()[2];
        assert_eq!(execute_call.method, Method::Post);
        assert_eq!(execute_call.path, "api/1.2/commands/execute");
        let body = execute_call.body.as_ref().unwrap();
        assert_eq!(body.get("command"), Some(&json!("1+1")));
        assert_eq!(body.get("contextId"), Some(&json!("42")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_table_result() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_ok(json!({"id": "7"}));
        transport.push_ok(json!({
            "status": "Finished",
            "results": {"resultType": "table", "data": [[1]], "schema": [{"name": "n"}]}
        }));

        let mut client = client(&transport);
        client.create_context().await;
        let outcome = client.execute("select 1", None).await;

        assert_eq!(
            outcome.payload(),
            Some(&Payload::Table {
                data: json!([[1]]),
                schema: json!([{"name": "n"}]),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_cancelled_cause_is_warning() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_ok(json!({"id": "7"}));
        transport.push_ok(json!({
            "status": "Finished",
            "results": {"resultType": "error", "cause": "CommandCancelledException: x"}
        }));

        let mut client = client(&transport);
        client.create_context().await;
        let outcome = client.execute("bad", None).await;
        assert_eq!(outcome, Outcome::Warning("Command cancelled".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_remote_cancelled_status_is_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_ok(json!({"id": "7"}));
        transport.push_ok(json!({"status": "Cancelling"}));
        transport.push_ok(json!({"status": "Cancelled"}));

        let mut client = client(&transport);
        client.create_context().await;
        let outcome = client.execute("while True: pass", None).await;
        assert_eq!(
            outcome,
            Outcome::Failure("Command execution cancelled".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_poll_exhaustion() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_ok(json!({"id": "7"}));
        for _ in 0..3 {
            transport.push_ok(json!({"status": "Running"}));
        }

        let mut client = ExecutionClient::with_poll_settings(
            Arc::clone(&transport) as Arc<dyn Transport>,
            info(),
            PollSettings {
                max_attempts: Some(2),
                ..PollSettings::default()
            },
        );
        client.create_context().await;
        let outcome = client.execute("slow", None).await;

        assert_eq!(
            outcome,
            Outcome::Failure("No terminal state after 2 polls".to_string())
        );
        assert_eq!(transport.calls_to("api/1.2/commands/status"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_aborts_poll() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_ok(json!({"id": "7"}));
        transport.push_ok(json!({"status": "Running"}));

        let mut client = client(&transport);
        client.create_context().await;
        let interrupt = client.interrupt_handle();
        interrupt.send(()).unwrap();

        let outcome = client.execute("slow", None).await;
        assert_eq!(outcome, Outcome::Failure("Poll interrupted".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_with_watch_emits_suffixes() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_ok(json!({"id": "7"}));
        transport.push_ok(json!({"status": "Running"}));
        transport.push_ok(json!({"status": "Running"}));
        transport.push_ok(json!({
            "status": "Finished",
            "results": {"resultType": "text", "data": "done"}
        }));

        let sink = Arc::new(ScriptedSink::new());
        sink.push_snapshot("a\n");
        sink.push_snapshot("a\nb\n");
        sink.push_snapshot("a\nb\nc\n");

        let mut watch = Watch::new(
            Arc::new(OutputStore::new()),
            Arc::clone(&sink) as Arc<dyn WatchSink>,
            "/watch/log.txt",
        );

        let mut client = client(&transport);
        client.create_context().await;
        let outcome = client.execute("print('x')", Some(&mut watch)).await;

        assert!(outcome.is_success());
        assert_eq!(
            watch.store().get_history(),
            vec![
                WatchEvent::Chunk("a\n".to_string()),
                WatchEvent::Chunk("b\n".to_string()),
                WatchEvent::Chunk("c\n".to_string()),
                WatchEvent::Finished,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_reports_success_on_transport_success() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_ok(json!({}));

        let mut client = client(&transport);
        client.create_context().await;
        let outcome = client.cancel().await;

        assert_eq!(outcome, Outcome::success_text("Command cancelled"));
        assert_eq!(transport.calls_to("api/1.2/commands/cancel"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_context() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_ok(json!({}));

        let mut client = client(&transport);
        client.create_context().await;
        assert_eq!(
            client.stop().await,
            Outcome::success_text("Execution context stopped")
        );
        assert_eq!(client.context_id(), None);

        // Context gone: the next execute fails before the network.
        let calls_before = transport.call_count();
        assert!(client.execute("1", None).await.is_failure());
        assert_eq!(transport.call_count(), calls_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_failure_keeps_context() {
        let transport = Arc::new(ScriptedTransport::new());
        scripted_context(&transport);
        transport.push_err(TransportError::Network("connection reset".to_string()));

        let mut client = client(&transport);
        client.create_context().await;
        assert!(client.stop().await.is_failure());
        assert_eq!(client.context_id(), Some("42"));
    }
}
