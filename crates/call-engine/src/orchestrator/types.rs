//! Call tracking types for the orchestrator

use chrono::{DateTime, Utc};

use crate::agent::AgentId;

/// Which side of a call a channel is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    /// Inbound caller leg
    Caller,

    /// Leg originated toward an agent endpoint
    AgentLeg,
}

/// Per-channel routing state
///
/// Caller legs move through the upper variants, agent legs through the
/// `Agent*` variants. Every transition is applied by exactly one event
/// handler; events for the same channel are serialized, so a channel never
/// observes two transitions at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Channel entered the application, not yet answered
    Entered,

    /// Channel answered, routing variables read
    Answered,

    /// Agent selection in progress
    Selecting,

    /// An agent leg is being originated for this caller
    Originating,

    /// Agent answered; bridge assembly in progress
    Bridging,

    /// Caller and agent are bridged
    Bridged,

    /// Waiting in a queue with on-hold media
    Queued,

    /// Torn down by the router; later events only clean up
    Terminated,

    /// Agent leg requested from the media server, not yet answered
    AgentOriginated,

    /// Agent leg answered
    AgentAnswered,

    /// Agent leg bridged to its caller
    AgentBridged,

    /// Agent leg torn down by the router; later events only clean up
    AgentGone,
}

/// In-memory context of one live channel
///
/// This is router-private state: everything cross-call lives in the shared
/// store, so a context can always be rebuilt from the channel's events.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    /// External channel identifier
    pub channel_id: String,

    /// Call center scope the channel belongs to
    pub call_center_id: String,

    /// Queue the channel is being routed through
    pub queue_id: String,

    /// Caller number presented when originating the agent leg
    pub caller_number: String,

    /// Caller or agent leg
    pub role: CallRole,

    /// Current routing state
    pub state: ChannelState,

    /// Channel id of the other leg once paired
    pub peer_channel_id: Option<String>,

    /// Agent bound to this call, if any
    pub agent_id: Option<AgentId>,

    /// Bridge joining the two legs, once created
    pub bridge_id: Option<String>,

    /// First enqueue instant; preserved across re-queues
    pub enqueue_time: Option<DateTime<Utc>>,
}

impl CallContext {
    /// Fresh context for a caller that just entered the application
    pub fn caller(channel_id: &str, caller_number: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            call_center_id: String::new(),
            queue_id: String::new(),
            caller_number: caller_number.to_string(),
            role: CallRole::Caller,
            state: ChannelState::Entered,
            peer_channel_id: None,
            agent_id: None,
            bridge_id: None,
            enqueue_time: None,
        }
    }

    /// Context for an agent leg originated on behalf of a caller
    pub fn agent_leg(channel_id: &str, caller: &CallContext, agent_id: AgentId) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            call_center_id: caller.call_center_id.clone(),
            queue_id: caller.queue_id.clone(),
            caller_number: caller.caller_number.clone(),
            role: CallRole::AgentLeg,
            state: ChannelState::AgentOriginated,
            peer_channel_id: Some(caller.channel_id.clone()),
            agent_id: Some(agent_id),
            bridge_id: None,
            enqueue_time: None,
        }
    }

    /// True while the channel is still routable
    pub fn is_live(&self) -> bool {
        !matches!(self.state, ChannelState::Terminated | ChannelState::AgentGone)
    }
}
