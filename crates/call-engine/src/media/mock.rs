//! Scripted media client for router tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CallCenterError, Result};

use super::{MediaClient, OriginateParams};

/// One recorded media-server action
#[derive(Debug, Clone, PartialEq)]
pub enum MediaAction {
    Answer(String),
    Hangup(String),
    Play { channel_id: String, media: String },
    StartHoldMusic(String),
    StopHoldMusic(String),
    Originate(OriginateParams),
    CreateBridge(String),
    AddChannels { bridge_id: String, channel_ids: Vec<String> },
    DestroyBridge(String),
}

/// Media client that records actions and fails on demand
#[derive(Default)]
pub struct MockMediaClient {
    actions: Mutex<Vec<MediaAction>>,
    bridge_sequence: AtomicUsize,
    pub fail_answer: AtomicBool,
    pub fail_originate: AtomicBool,
    pub fail_add_channels: AtomicBool,
}

impl MockMediaClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything the router asked the media server to do, in order
    pub fn actions(&self) -> Vec<MediaAction> {
        self.actions.lock().unwrap().clone()
    }

    /// Originations issued so far
    pub fn originations(&self) -> Vec<OriginateParams> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                MediaAction::Originate(params) => Some(params),
                _ => None,
            })
            .collect()
    }

    /// Channels the router hung up
    pub fn hangups(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                MediaAction::Hangup(channel_id) => Some(channel_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: MediaAction) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl MediaClient for MockMediaClient {
    async fn answer(&self, channel_id: &str) -> Result<()> {
        if self.fail_answer.load(Ordering::SeqCst) {
            return Err(CallCenterError::media("scripted answer failure"));
        }
        self.record(MediaAction::Answer(channel_id.to_string()));
        Ok(())
    }

    async fn hangup(&self, channel_id: &str) -> Result<()> {
        self.record(MediaAction::Hangup(channel_id.to_string()));
        Ok(())
    }

    async fn play(&self, channel_id: &str, media: &str) -> Result<()> {
        self.record(MediaAction::Play {
            channel_id: channel_id.to_string(),
            media: media.to_string(),
        });
        Ok(())
    }

    async fn start_hold_music(&self, channel_id: &str) -> Result<()> {
        self.record(MediaAction::StartHoldMusic(channel_id.to_string()));
        Ok(())
    }

    async fn stop_hold_music(&self, channel_id: &str) -> Result<()> {
        self.record(MediaAction::StopHoldMusic(channel_id.to_string()));
        Ok(())
    }

    async fn originate(&self, params: &OriginateParams) -> Result<()> {
        if self.fail_originate.load(Ordering::SeqCst) {
            return Err(CallCenterError::media("scripted origination failure"));
        }
        self.record(MediaAction::Originate(params.clone()));
        Ok(())
    }

    async fn create_bridge(&self) -> Result<String> {
        let id = format!("bridge-{}", self.bridge_sequence.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(MediaAction::CreateBridge(id.clone()));
        Ok(id)
    }

    async fn add_channels_to_bridge(&self, bridge_id: &str, channel_ids: &[String]) -> Result<()> {
        if self.fail_add_channels.load(Ordering::SeqCst) {
            return Err(CallCenterError::media("scripted bridge failure"));
        }
        self.record(MediaAction::AddChannels {
            bridge_id: bridge_id.to_string(),
            channel_ids: channel_ids.to_vec(),
        });
        Ok(())
    }

    async fn destroy_bridge(&self, bridge_id: &str) -> Result<()> {
        self.record(MediaAction::DestroyBridge(bridge_id.to_string()));
        Ok(())
    }
}
