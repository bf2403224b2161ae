//! Core call center orchestration engine
//!
//! This module contains the main [`CallCenterEngine`] struct that holds the
//! shared subsystems and the per-channel call contexts. Event handling is
//! split across the sibling modules: [`calls`](super::calls) covers the
//! entry path, routing, and bridging; [`lifecycle`](super::lifecycle)
//! covers teardown, wrap-up, and availability dispatch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::debug;

use crate::config::CallCenterConfig;
use crate::media::{ChannelEvent, MediaClient, AGENT_LEG_ARG};
use crate::repository::CallCenterRepository;
use crate::routing::RoundRobinSelector;
use crate::CallCenterStats;

use super::types::{CallContext, CallRole, ChannelState};

/// Primary call center orchestration engine
///
/// Serves as the per-call state machine driver: each external channel event
/// is dispatched to a handler that looks up the channel's current context
/// and applies one transition. Cross-call state (queues, agents, waiting
/// calls, rotation pointers) lives in the shared store behind the
/// repository; the contexts held here are private to the single router
/// process.
///
/// # Concurrency
///
/// Work items for distinct channels progress concurrently; work items for
/// the same channel must be serialized by the caller. The server does this
/// with one worker task per channel id, so [`handle_event`] never runs
/// twice concurrently for the same channel. Context reads and writes use
/// short map accesses and are never held across a media-server or store
/// call.
///
/// [`handle_event`]: CallCenterEngine::handle_event
pub struct CallCenterEngine {
    pub(super) config: CallCenterConfig,
    pub(super) repository: CallCenterRepository,
    pub(super) selector: RoundRobinSelector,
    pub(super) media: Arc<dyn MediaClient>,

    /// Live channel contexts keyed by channel id
    pub(super) active_calls: Arc<DashMap<String, CallContext>>,

    /// Callers processed since startup
    total_calls_handled: AtomicU64,

    /// Weak handle to this engine for router-owned timers
    pub(super) self_ref: Weak<CallCenterEngine>,
}

impl CallCenterEngine {
    /// Create an engine over the given repository and media client
    pub fn new(
        config: CallCenterConfig,
        repository: CallCenterRepository,
        media: Arc<dyn MediaClient>,
    ) -> Arc<Self> {
        let selector = RoundRobinSelector::new(repository.clone());
        Arc::new_cyclic(|self_ref| Self {
            config,
            repository,
            selector,
            media,
            active_calls: Arc::new(DashMap::new()),
            total_calls_handled: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        })
    }

    /// Repository shared with admin flows
    pub fn repository(&self) -> &CallCenterRepository {
        &self.repository
    }

    /// Apply one external channel event
    ///
    /// Events for the same channel must be delivered one at a time; the
    /// server's event loop guarantees this with per-channel workers.
    pub async fn handle_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::EnteredApp { channel, args } => {
                if args.iter().any(|arg| arg == AGENT_LEG_ARG) {
                    self.on_agent_leg_entered(channel).await;
                } else {
                    self.on_caller_entered(channel).await;
                }
            }
            ChannelEvent::LeftApp { channel } | ChannelEvent::Destroyed { channel } => {
                self.on_channel_gone(&channel.id).await;
            }
        }
    }

    /// Snapshot of the call center's current operational state
    pub fn stats(&self) -> CallCenterStats {
        let mut active_calls = 0;
        let mut queued_calls = 0;
        let mut active_bridges = 0;
        for entry in self.active_calls.iter() {
            if entry.role == CallRole::Caller && entry.is_live() {
                active_calls += 1;
                match entry.state {
                    ChannelState::Queued => queued_calls += 1,
                    ChannelState::Bridged => active_bridges += 1,
                    _ => {}
                }
            }
        }
        CallCenterStats {
            active_calls,
            queued_calls,
            active_bridges,
            total_calls_handled: self.total_calls_handled.load(Ordering::Relaxed),
        }
    }

    pub(super) fn count_handled_call(&self) {
        self.total_calls_handled.fetch_add(1, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------------
    // Context accessors. Guards are dropped before any store or media call.
    // ------------------------------------------------------------------------

    pub(super) fn insert_context(&self, context: CallContext) {
        self.active_calls.insert(context.channel_id.clone(), context);
    }

    pub(super) fn context_snapshot(&self, channel_id: &str) -> Option<CallContext> {
        self.active_calls.get(channel_id).map(|entry| entry.value().clone())
    }

    pub(super) fn update_context<F>(&self, channel_id: &str, apply: F)
    where
        F: FnOnce(&mut CallContext),
    {
        if let Some(mut entry) = self.active_calls.get_mut(channel_id) {
            apply(entry.value_mut());
        }
    }

    pub(super) fn remove_context(&self, channel_id: &str) -> Option<CallContext> {
        self.active_calls.remove(channel_id).map(|(_, context)| context)
    }

    /// Hang up a channel, tolerating it being gone already
    ///
    /// Channels are routinely torn down underneath the router; a failed
    /// hangup is logged and swallowed.
    pub(super) async fn safe_hangup(&self, channel_id: &str) {
        if let Err(e) = self.media.hangup(channel_id).await {
            debug!("Hangup of {} failed (channel likely gone): {}", channel_id, e);
        }
    }
}
