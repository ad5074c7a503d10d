//! Scripted doubles for exercising protocol flows without a network.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::traits::{Transport, TransportError, WatchSink};

/// HTTP method recorded by [`ScriptedTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    GetWith,
    Post,
}

/// One request observed by a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Transport double replaying a scripted sequence of responses while
/// recording every request it sees.
///
/// Responses are consumed in push order regardless of method or path.
/// An exhausted script answers with a network error rather than
/// panicking.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response body.
    pub fn push_ok(&self, value: Value) {
        self.responses.lock().unwrap().push_back(Ok(value));
    }

    /// Queue a transport failure.
    pub fn push_err(&self, err: TransportError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    /// Snapshot of every recorded request, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Total number of requests seen.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of requests against `path`.
    #[must_use]
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.path == path)
            .count()
    }

    fn next(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Network(
                    "scripted transport exhausted".to_string(),
                ))
            })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.next(Method::Get, path, None)
    }

    async fn get_with(&self, path: &str, query: Value) -> Result<Value, TransportError> {
        self.next(Method::GetWith, path, Some(query))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.next(Method::Post, path, Some(body))
    }
}

/// Watch-sink double returning scripted snapshots of a growing
/// artifact, one per `download` call.
#[derive(Default)]
pub struct ScriptedSink {
    snapshots: Mutex<VecDeque<Vec<u8>>>,
}

impl ScriptedSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the artifact content a future `download` returns.
    pub fn push_snapshot(&self, content: impl Into<Vec<u8>>) {
        self.snapshots.lock().unwrap().push_back(content.into());
    }
}

#[async_trait]
impl WatchSink for ScriptedSink {
    async fn download(&self, _path: &str) -> Result<Vec<u8>, TransportError> {
        self.snapshots
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Network("scripted sink exhausted".to_string()))
    }
}
