//! Broadcast + history store for incremental command output.

use std::{
    collections::VecDeque,
    sync::RwLock,
};

use futures::{StreamExt, future};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// History size limit (16 MB).
const HISTORY_BYTES: usize = 16 * 1024 * 1024;

/// Event emitted while a command's output is being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Output appended since the previous poll iteration.
    Chunk(String),
    /// Progress marker for an iteration without downloadable output.
    Marker,
    /// The command reached a terminal state.
    Finished,
}

impl WatchEvent {
    const fn approx_bytes(&self) -> usize {
        match self {
            Self::Chunk(s) => s.len(),
            Self::Marker | Self::Finished => 1,
        }
    }
}

#[derive(Clone)]
struct StoredEvent {
    event: WatchEvent,
    bytes: usize,
}

struct Inner {
    history: VecDeque<StoredEvent>,
    total_bytes: usize,
}

/// Output store with broadcast and history support.
///
/// Late subscribers receive the history first, then seamlessly switch
/// to live events.
pub struct OutputStore {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<WatchEvent>,
}

impl Default for OutputStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputStore {
    /// Create a new output store.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(4096);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                total_bytes: 0,
            }),
            sender,
        }
    }

    /// Push an event to both live listeners and history.
    pub fn push(&self, event: WatchEvent) {
        let _ = self.sender.send(event.clone()); // live listeners
        let bytes = event.approx_bytes();

        let mut inner = self.inner.write().unwrap();
        while inner.total_bytes.saturating_add(bytes) > HISTORY_BYTES {
            if let Some(front) = inner.history.pop_front() {
                inner.total_bytes = inner.total_bytes.saturating_sub(front.bytes);
            } else {
                break;
            }
        }
        inner.history.push_back(StoredEvent { event, bytes });
        inner.total_bytes = inner.total_bytes.saturating_add(bytes);
    }

    /// Push an output chunk.
    pub fn push_chunk<S: Into<String>>(&self, s: S) {
        self.push(WatchEvent::Chunk(s.into()));
    }

    /// Push a progress marker.
    pub fn push_marker(&self) {
        self.push(WatchEvent::Marker);
    }

    /// Push the terminal notification.
    pub fn push_finished(&self) {
        self.push(WatchEvent::Finished);
    }

    /// Get a receiver for live events.
    #[must_use]
    pub fn get_receiver(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn get_history(&self) -> Vec<WatchEvent> {
        self.inner
            .read()
            .unwrap()
            .history
            .iter()
            .map(|s| s.event.clone())
            .collect()
    }

    /// Stream that yields history first, then live events.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, WatchEvent> {
        let (history, rx) = (self.get_history(), self.get_receiver());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }

    /// Stream of output chunks (until Finished).
    #[must_use]
    pub fn chunk_stream(&self) -> futures::stream::BoxStream<'static, String> {
        self.history_plus_stream()
            .take_while(|event| future::ready(*event != WatchEvent::Finished))
            .filter_map(|event| async move {
                match event {
                    WatchEvent::Chunk(s) => Some(s),
                    _ => None,
                }
            })
            .boxed()
    }
}
