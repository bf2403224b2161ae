//! Media-server control interface
//!
//! The router drives an external media server over an event-oriented
//! control protocol: channel events flow in, control actions (answer, play,
//! originate, bridge, hang up) flow out. [`MediaClient`] names exactly the
//! actions the routing core needs so the transport can be swapped; the
//! shipped implementation is the ARI client in [`ari`].

pub mod ari;

#[cfg(test)]
pub mod mock;

pub use ari::AriClient;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// Media id of the prompt played to callers outside operating hours.
pub const NO_SERVICE_MEDIA: &str = "sound:ss-noservice";

/// Application argument marking an originated agent leg.
pub const AGENT_LEG_ARG: &str = "agent_leg";

/// Channel facts carried by every event
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    /// External channel identifier
    pub id: String,

    /// Channel state as reported by the media server (`Up` once answered)
    pub state: String,

    /// Caller number, empty when withheld
    pub caller_number: String,

    /// Dialplan variable bag supplied with the channel
    pub variables: HashMap<String, String>,
}

impl ChannelInfo {
    /// True once the media server reports the channel answered
    pub fn is_answered(&self) -> bool {
        self.state == "Up"
    }

    /// Look up a dialplan variable
    pub fn var(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

/// Control-protocol events consumed by the router
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Channel entered the routing application
    EnteredApp {
        channel: ChannelInfo,
        /// Application arguments; contains [`AGENT_LEG_ARG`] for agent legs
        args: Vec<String>,
    },

    /// Channel left the routing application
    LeftApp { channel: ChannelInfo },

    /// Channel was destroyed
    Destroyed { channel: ChannelInfo },
}

impl ChannelEvent {
    /// Channel id the event belongs to
    pub fn channel_id(&self) -> &str {
        match self {
            ChannelEvent::EnteredApp { channel, .. }
            | ChannelEvent::LeftApp { channel }
            | ChannelEvent::Destroyed { channel } => &channel.id,
        }
    }
}

/// Parameters for originating a new channel
#[derive(Debug, Clone, PartialEq)]
pub struct OriginateParams {
    /// Pre-assigned id of the new channel, so its events can be correlated
    pub channel_id: String,

    /// Endpoint address to dial
    pub endpoint: String,

    /// Caller id presented to the dialed party
    pub caller_id: String,

    /// Application the new channel is delivered to on answer
    pub app_name: String,

    /// Application arguments
    pub app_args: Vec<String>,

    /// Seconds to wait for an answer before the origination fails
    pub timeout_seconds: u32,
}

/// Control actions issued to the media server
///
/// Every operation may fail independently; failures surface as
/// [`crate::error::CallCenterError::Media`] and the router decides recovery
/// per call.
#[async_trait]
pub trait MediaClient: Send + Sync {
    /// Answer a channel
    async fn answer(&self, channel_id: &str) -> Result<()>;

    /// Hang up a channel
    async fn hangup(&self, channel_id: &str) -> Result<()>;

    /// Play a media id on a channel
    async fn play(&self, channel_id: &str, media: &str) -> Result<()>;

    /// Start on-hold music using the server's default music class
    async fn start_hold_music(&self, channel_id: &str) -> Result<()>;

    /// Stop on-hold music
    async fn stop_hold_music(&self, channel_id: &str) -> Result<()>;

    /// Originate a new channel toward an endpoint
    async fn originate(&self, params: &OriginateParams) -> Result<()>;

    /// Create a mixing bridge, returning its id
    async fn create_bridge(&self) -> Result<String>;

    /// Add channels to a bridge
    async fn add_channels_to_bridge(&self, bridge_id: &str, channel_ids: &[String]) -> Result<()>;

    /// Destroy a bridge
    async fn destroy_bridge(&self, bridge_id: &str) -> Result<()>;
}
