//! Incremental output watching during command polls.

use std::sync::Arc;

use dbrun_core::{OutputStore, WatchSink};

/// Side-channel observing a growing remote output artifact while a
/// command runs.
///
/// With a sink, each poll iteration downloads the artifact and emits
/// only the suffix appended since the previous iteration. Without a
/// sink, iterations emit progress markers. Sink failures are logged
/// and never abort the poll.
pub struct Watch {
    source: Option<Source>,
    store: Arc<OutputStore>,
    offset: usize,
}

struct Source {
    sink: Arc<dyn WatchSink>,
    path: String,
}

impl Watch {
    /// Watch without a sink: iterations emit markers only.
    #[must_use]
    pub fn markers(store: Arc<OutputStore>) -> Self {
        Self {
            source: None,
            store,
            offset: 0,
        }
    }

    /// Watch the artifact at `path` through `sink`.
    #[must_use]
    pub fn new(store: Arc<OutputStore>, sink: Arc<dyn WatchSink>, path: impl Into<String>) -> Self {
        Self {
            source: Some(Source {
                sink,
                path: path.into(),
            }),
            store,
            offset: 0,
        }
    }

    /// Store receiving watch events.
    #[must_use]
    pub fn store(&self) -> &Arc<OutputStore> {
        &self.store
    }

    /// One poll iteration: emit the newly appended suffix, or a marker
    /// when there is no sink.
    pub(crate) async fn tick(&mut self) {
        let Some(source) = &self.source else {
            self.store.push_marker();
            return;
        };
        match source.sink.download(&source.path).await {
            Ok(content) => {
                if content.len() > self.offset {
                    let suffix = String::from_utf8_lossy(&content[self.offset..]).into_owned();
                    self.offset = content.len();
                    self.store.push_chunk(suffix);
                }
            }
            Err(e) => tracing::error!("watch download failed: {e}"),
        }
    }

    /// Mark the watched command as terminal.
    pub(crate) fn finish(&self) {
        self.store.push_finished();
    }
}
