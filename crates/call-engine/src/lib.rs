//! # Dialer Call Engine
//!
//! The call-distribution core of a contact center: it receives inbound
//! channels from a media server over an event-oriented control protocol,
//! decides whether each call may be served, selects an agent by
//! round-robin rotation, bridges caller and agent, and queues calls when
//! nobody is available. Shared state about queues, agents, waiting calls,
//! and rotation pointers lives in a Redis-backed store so admin tooling
//! and the router see one truth.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   events    ┌──────────────────┐
//! │   Media Server   │────────────▶│  Channel Event    │
//! │      (ARI)       │◀────────────│  Adapter (media)  │
//! └──────────────────┘   actions   └────────┬─────────┘
//!                                           │
//!                                  ┌────────▼─────────┐
//!                                  │   Call Router     │
//!                                  │  (orchestrator)   │
//!                                  └────────┬─────────┘
//!                        ┌─────────────────┼──────────────────┐
//!                        │                 │                  │
//!               ┌────────▼──────┐ ┌────────▼───────┐ ┌────────▼───────┐
//!               │    Timing     │ │  Queue/Agent    │ │  Round-Robin   │
//!               │   Evaluator   │ │  Repository     │ │  Selector      │
//!               └───────────────┘ └────────┬───────┘ └────────┬───────┘
//!                                          │                  │
//!                                  ┌───────▼──────────────────▼───────┐
//!                                  │        Shared Store (Redis)       │
//!                                  └──────────────────────────────────┘
//! ```
//!
//! ## Key Modules
//!
//! - [`orchestrator`]: per-call state machine driven by channel events
//! - [`routing`]: round-robin agent selection with a persisted rotation
//! - [`repository`]: queue/agent CRUD, membership, waiting calls
//! - [`timing`]: operating-hours and shift-window rule evaluation
//! - [`store`]: swappable key/value store backends (Redis, in-memory)
//! - [`media`]: media-server control interface and the ARI client
//! - [`api`]: administrative operations (queues, agents, login/logout)
//! - [`server`]: event loop wiring everything together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dialer_call_engine::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let config = CallCenterConfig::from_env()?;
//! let server = CallCenterServerBuilder::new()
//!     .with_config(config)
//!     .build()
//!     .await?;
//!
//! server.reconcile("acme").await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;

// Call center functionality modules
pub mod agent;
pub mod orchestrator;
pub mod queue;
pub mod repository;
pub mod routing;
pub mod timing;

// External interfaces
pub mod api;
pub mod media;
pub mod server;
pub mod store;

// Re-exports for convenience
pub use config::CallCenterConfig;
pub use error::{CallCenterError, Result};
pub use orchestrator::CallCenterEngine;
pub use server::{CallCenterServer, CallCenterServerBuilder};

/// Call center statistics
///
/// A snapshot of the router's current operational state, computed from the
/// in-memory call contexts.
#[derive(Debug, Clone)]
pub struct CallCenterStats {
    /// Number of live caller channels
    pub active_calls: usize,

    /// Callers currently waiting in a queue
    pub queued_calls: usize,

    /// Bridged caller/agent pairs
    pub active_bridges: usize,

    /// Total number of callers handled since startup
    pub total_calls_handled: u64,
}

/// Prelude module for convenient imports
pub mod prelude {
    //! Commonly used types for call center applications

    pub use crate::agent::{Agent, AgentId, AgentStatus};
    pub use crate::api::AdminApi;
    pub use crate::config::{AriConfig, CallCenterConfig, GeneralConfig, RedisConfig};
    pub use crate::error::{CallCenterError, Result};
    pub use crate::media::{AriClient, ChannelEvent, ChannelInfo, MediaClient, OriginateParams};
    pub use crate::orchestrator::{CallCenterEngine, CallContext, CallRole, ChannelState};
    pub use crate::queue::{Queue, QueueStatus, QueueStrategy, WaitingCall};
    pub use crate::repository::{CallCenterRepository, StatusContext};
    pub use crate::routing::RoundRobinSelector;
    pub use crate::server::{CallCenterServer, CallCenterServerBuilder};
    pub use crate::store::{MemoryStore, RedisStore, Store};
    pub use crate::timing::TimingRules;
    pub use crate::CallCenterStats;
}
