//! Remote command protocol client.
//!
//! Provides:
//! - `ExecutionClient` - create/execute/cancel/stop against one remote context
//! - `PollSettings` - poll intervals, bounds, and interruption
//! - `Watch` - incremental output side-channel for long commands

pub mod client;
pub mod watch;

mod catalog;
mod status;

pub use client::{ExecutionClient, ExecutionError, PollSettings};
pub use watch::Watch;
