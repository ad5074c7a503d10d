//! REST transport and typed endpoint clients for the remote workspace.
//!
//! Provides:
//! - `RestClient` - Authenticated HTTP transport with uniform error wrapping
//! - `ClustersClient` - Cluster list and lifecycle triggers
//! - `DbfsClient` - File upload/download, also the production watch sink
//! - `SecretsClient` - Secret scope and key listing

pub mod clusters;
pub mod dbfs;
pub mod rest;
pub mod secrets;

pub use clusters::{ClusterSummary, ClustersClient};
pub use dbfs::DbfsClient;
pub use rest::RestClient;
pub use secrets::SecretsClient;
