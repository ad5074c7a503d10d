//! Named sessions over execution-context clients.
//!
//! A `Session` pairs one `ExecutionClient` with its connection info and
//! an interrupt handle; the `SessionRegistry` maps caller-chosen names
//! to shared sessions.

pub mod registry;

pub use registry::{Session, SessionRegistry};
