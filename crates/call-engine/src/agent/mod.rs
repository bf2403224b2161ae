//! Agent domain types
//!
//! Agents are staffed endpoints that log into one or more queues. Their
//! status drives selection eligibility: only an `AVAILABLE` agent inside its
//! shift window can be handed a call. Status and queue membership live in
//! the shared store; the repository is the only writer.

pub mod types;

pub use types::{Agent, AgentId, AgentStatus};
