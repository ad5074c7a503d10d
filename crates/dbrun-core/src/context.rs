//! Immutable connection parameters for one session.

use serde::{Deserialize, Serialize};

use crate::Language;

/// Connection parameters captured when a session is created.
///
/// The bearer token is deliberately absent; it lives inside the
/// transport, so this struct is safe to log and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Connection profile label.
    pub profile: String,
    /// Base host of the remote workspace.
    pub host: String,
    /// Cluster the context is bound to.
    pub cluster_id: String,
    /// Display name of the cluster.
    pub cluster_name: String,
    /// Execution language, immutable for the session's lifetime.
    pub language: Language,
}

impl ConnectionInfo {
    #[must_use]
    pub fn new(
        profile: impl Into<String>,
        host: impl Into<String>,
        cluster_id: impl Into<String>,
        cluster_name: impl Into<String>,
        language: Language,
    ) -> Self {
        Self {
            profile: profile.into(),
            host: host.into(),
            cluster_id: cluster_id.into(),
            cluster_name: cluster_name.into(),
            language,
        }
    }
}
