//! ARI media-server client
//!
//! Control actions go over the ARI REST interface; channel events arrive on
//! the ARI WebSocket for the configured application. Only the events the
//! router consumes are decoded; everything else on the wire is ignored.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::AriConfig;
use crate::error::{CallCenterError, Result};

use super::{ChannelEvent, ChannelInfo, MediaClient, OriginateParams};

/// ARI client over REST and WebSocket
#[derive(Clone)]
pub struct AriClient {
    http: reqwest::Client,
    config: AriConfig,
}

impl AriClient {
    /// Create a client for the given ARI endpoint
    pub fn new(config: AriConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.rest_url(), path)
    }

    async fn check(&self, response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(CallCenterError::media(format!(
                "{} failed with {}: {}",
                action, status, body
            )))
        }
    }

    async fn post(&self, path: &str, query: &[(&str, &str)], action: &str) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.endpoint(path))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .query(query)
            .send()
            .await
            .map_err(|e| CallCenterError::media(format!("{} failed: {}", action, e)))?;
        self.check(response, action).await
    }

    async fn delete(&self, path: &str, action: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint(path))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| CallCenterError::media(format!("{} failed: {}", action, e)))?;
        self.check(response, action).await?;
        Ok(())
    }

    /// Pump application events into the given channel until the transport drops
    ///
    /// Returns only on failure: a closed or errored WebSocket is fatal to
    /// routing and surfaces as a transport error.
    pub async fn run_events(&self, events: mpsc::UnboundedSender<ChannelEvent>) -> Result<()> {
        let url = self.config.events_url();
        info!("🔗 Connecting to media server events for app {}", self.config.app_name);

        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| CallCenterError::transport(format!("event connection failed: {}", e)))?;
        info!("✅ Media server event stream established");

        let (mut sink, mut source) = stream.split();
        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Some(event) = decode_event(&text) {
                        if events.send(event).is_err() {
                            return Err(CallCenterError::transport("event consumer dropped"));
                        }
                    }
                }
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = sink.send(Message::Pong(payload)).await {
                        return Err(CallCenterError::transport(format!("pong failed: {}", e)));
                    }
                }
                Ok(Message::Close(frame)) => {
                    return Err(CallCenterError::transport(format!(
                        "event stream closed: {:?}",
                        frame
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(CallCenterError::transport(format!("event stream error: {}", e)));
                }
            }
        }
        Err(CallCenterError::transport("event stream ended"))
    }
}

#[async_trait]
impl MediaClient for AriClient {
    async fn answer(&self, channel_id: &str) -> Result<()> {
        self.post(&format!("/channels/{}/answer", channel_id), &[], "answer")
            .await?;
        Ok(())
    }

    async fn hangup(&self, channel_id: &str) -> Result<()> {
        self.delete(&format!("/channels/{}", channel_id), "hangup").await
    }

    async fn play(&self, channel_id: &str, media: &str) -> Result<()> {
        self.post(
            &format!("/channels/{}/play", channel_id),
            &[("media", media)],
            "play",
        )
        .await?;
        Ok(())
    }

    async fn start_hold_music(&self, channel_id: &str) -> Result<()> {
        // No mohClass parameter: the server's default music class applies.
        self.post(&format!("/channels/{}/moh", channel_id), &[], "start hold music")
            .await?;
        Ok(())
    }

    async fn stop_hold_music(&self, channel_id: &str) -> Result<()> {
        self.delete(&format!("/channels/{}/moh", channel_id), "stop hold music")
            .await
    }

    async fn originate(&self, params: &OriginateParams) -> Result<()> {
        let timeout = params.timeout_seconds.to_string();
        let app_args = params.app_args.join(",");
        let query = [
            ("channelId", params.channel_id.as_str()),
            ("endpoint", params.endpoint.as_str()),
            ("callerId", params.caller_id.as_str()),
            ("app", params.app_name.as_str()),
            ("appArgs", app_args.as_str()),
            ("timeout", timeout.as_str()),
        ];
        self.post("/channels", &query, "originate").await?;
        Ok(())
    }

    async fn create_bridge(&self) -> Result<String> {
        let response = self
            .post("/bridges", &[("type", "mixing")], "create bridge")
            .await?;
        let bridge: AriBridge = response
            .json()
            .await
            .map_err(|e| CallCenterError::media(format!("bridge response unparsable: {}", e)))?;
        Ok(bridge.id)
    }

    async fn add_channels_to_bridge(&self, bridge_id: &str, channel_ids: &[String]) -> Result<()> {
        let channels = channel_ids.join(",");
        self.post(
            &format!("/bridges/{}/addChannel", bridge_id),
            &[("channel", channels.as_str())],
            "add channels",
        )
        .await?;
        Ok(())
    }

    async fn destroy_bridge(&self, bridge_id: &str) -> Result<()> {
        self.delete(&format!("/bridges/{}", bridge_id), "destroy bridge")
            .await
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AriEvent {
    StasisStart {
        #[serde(default)]
        args: Vec<String>,
        channel: AriChannel,
    },
    StasisEnd {
        channel: AriChannel,
    },
    ChannelDestroyed {
        channel: AriChannel,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AriChannel {
    id: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    caller: AriCallerId,
    #[serde(default)]
    channelvars: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct AriCallerId {
    #[serde(default)]
    number: String,
}

#[derive(Debug, Deserialize)]
struct AriBridge {
    id: String,
}

impl From<AriChannel> for ChannelInfo {
    fn from(channel: AriChannel) -> Self {
        ChannelInfo {
            id: channel.id,
            state: channel.state,
            caller_number: channel.caller.number,
            variables: channel.channelvars,
        }
    }
}

fn decode_event(text: &str) -> Option<ChannelEvent> {
    let event: AriEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Undecodable media event: {} ({})", e, text);
            return None;
        }
    };
    match event {
        AriEvent::StasisStart { args, channel } => Some(ChannelEvent::EnteredApp {
            channel: channel.into(),
            args,
        }),
        AriEvent::StasisEnd { channel } => Some(ChannelEvent::LeftApp {
            channel: channel.into(),
        }),
        AriEvent::ChannelDestroyed { channel } => Some(ChannelEvent::Destroyed {
            channel: channel.into(),
        }),
        AriEvent::Other => {
            debug!("Ignoring media event: {}", text);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stasis_start_decodes_to_entered_app() {
        let text = r#"{
            "type": "StasisStart",
            "args": ["agent_leg"],
            "channel": {
                "id": "chan-42",
                "state": "Up",
                "caller": {"number": "+15550001", "name": "Caller"},
                "channelvars": {"CALL_CENTER_ID": "cc1", "QUEUE_ID": "q1"}
            }
        }"#;
        match decode_event(text) {
            Some(ChannelEvent::EnteredApp { channel, args }) => {
                assert_eq!(channel.id, "chan-42");
                assert!(channel.is_answered());
                assert_eq!(channel.caller_number, "+15550001");
                assert_eq!(channel.var("QUEUE_ID"), Some("q1"));
                assert_eq!(args, vec!["agent_leg".to_string()]);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn stasis_end_and_destroy_decode() {
        let end = r#"{"type": "StasisEnd", "channel": {"id": "chan-1", "state": "Up"}}"#;
        assert!(matches!(
            decode_event(end),
            Some(ChannelEvent::LeftApp { channel }) if channel.id == "chan-1"
        ));

        let destroyed = r#"{"type": "ChannelDestroyed", "channel": {"id": "chan-2"}}"#;
        assert!(matches!(
            decode_event(destroyed),
            Some(ChannelEvent::Destroyed { channel }) if channel.id == "chan-2"
        ));
    }

    #[test]
    fn unrelated_and_malformed_events_are_ignored() {
        assert_eq!(decode_event(r#"{"type": "ChannelVarset", "value": "x"}"#), None);
        assert_eq!(decode_event("not json"), None);
    }
}
