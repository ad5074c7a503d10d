//! Cluster list and lifecycle endpoints.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};

use dbrun_core::traits::{Transport, TransportError};

/// Summary row from the cluster list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub cluster_name: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Typed client for `api/2.0/clusters/*`.
pub struct ClustersClient {
    transport: Arc<dyn Transport>,
}

impl ClustersClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// List all clusters in the workspace.
    ///
    /// # Errors
    /// Returns an error on transport failure or a malformed body.
    pub async fn list(&self) -> Result<Vec<ClusterSummary>, TransportError> {
        let body = self.transport.get("api/2.0/clusters/list").await?;
        let clusters = body.get("clusters").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(clusters).map_err(|e| TransportError::Network(e.to_string()))
    }

    /// Cluster id/name pairs, in list order.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn names(&self) -> Result<Vec<(String, String)>, TransportError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|c| (c.cluster_id, c.cluster_name))
            .collect())
    }

    /// Full info for one cluster.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn info(&self, cluster_id: &str) -> Result<Value, TransportError> {
        self.transport
            .get_with("api/2.0/clusters/get", json!({ "cluster_id": cluster_id }))
            .await
    }

    /// Start a terminated cluster.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn start(&self, cluster_id: &str) -> Result<(), TransportError> {
        self.transport
            .post("api/2.0/clusters/start", json!({ "cluster_id": cluster_id }))
            .await?;
        Ok(())
    }

    /// Terminate a running cluster. The remote names this "delete";
    /// the cluster definition itself is kept.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn stop(&self, cluster_id: &str) -> Result<(), TransportError> {
        self.transport
            .post("api/2.0/clusters/delete", json!({ "cluster_id": cluster_id }))
            .await?;
        Ok(())
    }

    /// Restart a running cluster.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn restart(&self, cluster_id: &str) -> Result<(), TransportError> {
        self.transport
            .post("api/2.0/clusters/restart", json!({ "cluster_id": cluster_id }))
            .await?;
        Ok(())
    }
}
