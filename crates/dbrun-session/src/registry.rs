//! Registry mapping caller-chosen names to shared sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, oneshot};

use dbrun_core::ConnectionInfo;
use dbrun_exec::ExecutionClient;

/// One named connection: a client plus the parameters it was created
/// with and a one-shot interrupt handle for its poll loop.
pub struct Session {
    info: ConnectionInfo,
    client: Mutex<ExecutionClient>,
    interrupt_tx: std::sync::Mutex<Option<oneshot::Sender<()>>>,
}

impl Session {
    /// Wrap `client`, arming its interrupt handle.
    #[must_use]
    pub fn new(mut client: ExecutionClient) -> Self {
        let info = client.info().clone();
        let interrupt_tx = client.interrupt_handle();
        Self {
            info,
            client: Mutex::new(client),
            interrupt_tx: std::sync::Mutex::new(Some(interrupt_tx)),
        }
    }

    /// Connection parameters for this session.
    #[must_use]
    pub const fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Lock guarding the client. Operations on one session serialize
    /// here, so a poll loop never races a second submission.
    pub const fn client(&self) -> &Mutex<ExecutionClient> {
        &self.client
    }

    /// Fire the interrupt handle. Returns whether a live poll loop was
    /// signalled; subsequent calls return `false`.
    pub fn interrupt(&self) -> bool {
        self.interrupt_tx
            .lock()
            .unwrap()
            .take()
            .is_some_and(|tx| tx.send(()).is_ok())
    }
}

/// Shared map of session names to sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` under `name`, replacing any previous session
    /// with that name.
    pub async fn insert(&self, name: impl Into<String>, session: Arc<Session>) {
        let name = name.into();
        let replaced = self
            .sessions
            .write()
            .await
            .insert(name.clone(), session)
            .is_some();
        if replaced {
            tracing::debug!(%name, "session replaced");
        }
    }

    /// Look up a session by name.
    pub async fn get(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(name).map(Arc::clone)
    }

    /// Drop the session named `name`. Returns the number of sessions
    /// remaining.
    pub async fn remove(&self, name: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        sessions.remove(name);
        sessions.len()
    }

    /// Names of all registered sessions.
    pub async fn names(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Names of sessions bound to `cluster_id`.
    pub async fn names_for_cluster(&self, cluster_id: &str) -> Vec<String> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|(_, s)| s.info().cluster_id == cluster_id)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Distinct profiles across all sessions, sorted.
    pub async fn distinct_profiles(&self) -> Vec<String> {
        let mut profiles: Vec<String> = self
            .sessions
            .read()
            .await
            .values()
            .map(|s| s.info().profile.clone())
            .collect();
        profiles.sort();
        profiles.dedup();
        profiles
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbrun_core::testing::ScriptedTransport;
    use dbrun_core::{Language, Transport};

    fn session(profile: &str, cluster: &str) -> Arc<Session> {
        let transport = Arc::new(ScriptedTransport::new()) as Arc<dyn Transport>;
        let info = ConnectionInfo::new(profile, "https://h.example", cluster, cluster, Language::Python);
        Arc::new(Session::new(ExecutionClient::new(transport, info)))
    }

    #[tokio::test]
    async fn test_insert_replaces_same_name() {
        let registry = SessionRegistry::new();
        registry.insert("dev", session("p1", "c1")).await;
        registry.insert("dev", session("p2", "c1")).await;

        assert_eq!(registry.len().await, 1);
        let got = registry.get("dev").await.unwrap();
        assert_eq!(got.info().profile, "p2");
    }

    #[tokio::test]
    async fn test_remove_reports_remaining() {
        let registry = SessionRegistry::new();
        registry.insert("a", session("p", "c1")).await;
        registry.insert("b", session("p", "c2")).await;

        assert_eq!(registry.remove("a").await, 1);
        assert_eq!(registry.remove("missing").await, 1);
        assert_eq!(registry.remove("b").await, 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_names_for_cluster_filters() {
        let registry = SessionRegistry::new();
        registry.insert("a", session("p", "c1")).await;
        registry.insert("b", session("p", "c2")).await;
        registry.insert("c", session("p", "c1")).await;

        let mut names = registry.names_for_cluster("c1").await;
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_distinct_profiles_sorted_and_deduped() {
        let registry = SessionRegistry::new();
        registry.insert("a", session("staging", "c1")).await;
        registry.insert("b", session("dev", "c2")).await;
        registry.insert("c", session("dev", "c3")).await;

        assert_eq!(
            registry.distinct_profiles().await,
            vec!["dev".to_string(), "staging".to_string()]
        );
    }

    #[tokio::test]
    async fn test_interrupt_fires_once() {
        let s = session("p", "c1");
        assert!(s.interrupt());
        assert!(!s.interrupt());
    }
}
