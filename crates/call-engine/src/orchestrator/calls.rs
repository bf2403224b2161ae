//! Call handling: entry path, routing, and bridging
//!
//! A caller channel arrives with its call center and queue in the dialplan
//! variable bag. The entry path answers it, checks the queue's operating
//! hours, and dispatches on the queue strategy. Round-robin routing either
//! originates a leg toward the selected agent or parks the caller in the
//! queue with on-hold media. When the agent leg answers, both legs are
//! joined in a mixing bridge.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::{AgentId, AgentStatus};
use crate::media::{ChannelInfo, OriginateParams, AGENT_LEG_ARG, NO_SERVICE_MEDIA};
use crate::queue::{QueueStrategy, WaitingCall};
use crate::repository::StatusContext;

use super::core::CallCenterEngine;
use super::types::{CallContext, ChannelState};

/// Dialplan variable naming the call center scope.
const CALL_CENTER_VAR: &str = "CALL_CENTER_ID";

/// Dialplan variable naming the target queue.
const QUEUE_VAR: &str = "QUEUE_ID";

/// Seconds the media server waits for the agent to answer an origination.
const AGENT_ANSWER_TIMEOUT_SECONDS: u32 = 15;

impl CallCenterEngine {
    /// Entry path for an inbound caller channel
    pub(super) async fn on_caller_entered(&self, channel: ChannelInfo) {
        let channel_id = channel.id.clone();
        info!("📞 Caller channel {} entered from {:?}", channel_id, channel.caller_number);
        self.count_handled_call();
        self.insert_context(CallContext::caller(&channel_id, &channel.caller_number));

        // Answer before anything else; a channel that cannot be answered
        // cannot be routed.
        if !channel.is_answered() {
            if let Err(e) = self.media.answer(&channel_id).await {
                warn!("Answer of {} failed, dropping call: {}", channel_id, e);
                self.safe_hangup(&channel_id).await;
                self.remove_context(&channel_id);
                return;
            }
        }

        let (call_center_id, queue_id) = match (channel.var(CALL_CENTER_VAR), channel.var(QUEUE_VAR)) {
            (Some(cc), Some(queue)) if !cc.is_empty() && !queue.is_empty() => {
                (cc.to_string(), queue.to_string())
            }
            _ => {
                warn!(
                    "Channel {} is missing {} or {}, dropping call",
                    channel_id, CALL_CENTER_VAR, QUEUE_VAR
                );
                self.safe_hangup(&channel_id).await;
                self.remove_context(&channel_id);
                return;
            }
        };
        self.update_context(&channel_id, |context| {
            context.call_center_id = call_center_id.clone();
            context.queue_id = queue_id.clone();
            context.state = ChannelState::Answered;
        });

        // Operating hours are evaluated per call; the stored queue status
        // is advisory only.
        let now = Utc::now();
        match self.repository.is_queue_active(&call_center_id, &queue_id, &now).await {
            Ok(true) => {}
            Ok(false) => {
                info!("🌙 Queue {} is outside operating hours, deflecting {}", queue_id, channel_id);
                if let Err(e) = self.media.play(&channel_id, NO_SERVICE_MEDIA).await {
                    warn!("No-service prompt on {} failed: {}", channel_id, e);
                }
                self.safe_hangup(&channel_id).await;
                self.update_context(&channel_id, |context| context.state = ChannelState::Terminated);
                return;
            }
            Err(e) => {
                // Unknown queue or store failure: disconnect silently.
                warn!("Queue {} lookup for {} failed: {}", queue_id, channel_id, e);
                self.safe_hangup(&channel_id).await;
                self.update_context(&channel_id, |context| context.state = ChannelState::Terminated);
                return;
            }
        }

        let queue = match self.repository.queue_details(&call_center_id, &queue_id).await {
            Ok(queue) => queue,
            Err(e) => {
                warn!("Queue {} vanished while routing {}: {}", queue_id, channel_id, e);
                self.safe_hangup(&channel_id).await;
                self.update_context(&channel_id, |context| context.state = ChannelState::Terminated);
                return;
            }
        };

        match queue.strategy {
            QueueStrategy::RoundRobin => self.route_caller(&channel_id).await,
            other => {
                warn!(
                    "Queue {} uses unsupported strategy {}, dropping call {}",
                    queue_id, other, channel_id
                );
                self.safe_hangup(&channel_id).await;
                self.update_context(&channel_id, |context| context.state = ChannelState::Terminated);
            }
        }
    }

    /// One round-robin routing attempt for a caller
    ///
    /// Either hands the caller to an agent or parks it in the queue; every
    /// failure path below also ends in the queue, so the caller is never
    /// silently lost after this point.
    pub(super) async fn route_caller(&self, channel_id: &str) {
        let Some(context) = self.context_snapshot(channel_id) else {
            return;
        };
        self.update_context(channel_id, |c| c.state = ChannelState::Selecting);

        let now = Utc::now();
        match self
            .selector
            .select(&context.call_center_id, &context.queue_id, &now)
            .await
        {
            Some(agent_id) => {
                self.offer_call_to_agent(channel_id, &agent_id).await;
            }
            None => self.enqueue_caller(channel_id).await,
        }
    }

    /// Originate an agent leg for a caller
    ///
    /// The rotation pointer has already advanced, so a failure here does
    /// not starve the next agent: the caller is queued and the attempt is
    /// charged to this agent. Returns whether an origination was actually
    /// issued; on failure the caller has been parked back in its queue.
    pub(super) async fn offer_call_to_agent(&self, caller_channel_id: &str, agent_id: &AgentId) -> bool {
        let Some(context) = self.context_snapshot(caller_channel_id) else {
            return false;
        };
        let cc = &context.call_center_id;

        let agent = match self.repository.agent_details(cc, agent_id.as_ref()).await {
            Ok(agent) if !agent.endpoint.is_empty() => agent,
            Ok(_) => {
                warn!("Agent {} has no endpoint, queueing caller {}", agent_id, caller_channel_id);
                self.enqueue_caller(caller_channel_id).await;
                return false;
            }
            Err(e) => {
                warn!("Agent {} lookup failed ({}), queueing caller {}", agent_id, e, caller_channel_id);
                self.enqueue_caller(caller_channel_id).await;
                return false;
            }
        };

        if let Err(e) = self
            .repository
            .set_agent_status(
                cc,
                agent_id.as_ref(),
                AgentStatus::Ringing,
                Some(&StatusContext::bound_to(caller_channel_id)),
            )
            .await
        {
            // Lost the race for this agent; park the caller instead.
            warn!("Could not ring agent {} ({}), queueing caller {}", agent_id, e, caller_channel_id);
            self.enqueue_caller(caller_channel_id).await;
            return false;
        }

        let leg_channel_id = format!("agent-{}", Uuid::new_v4());
        self.insert_context(CallContext::agent_leg(&leg_channel_id, &context, agent_id.clone()));
        self.update_context(caller_channel_id, |c| {
            c.state = ChannelState::Originating;
            c.agent_id = Some(agent_id.clone());
            c.peer_channel_id = Some(leg_channel_id.clone());
        });

        info!(
            "📲 Originating agent leg {} to {} for caller {}",
            leg_channel_id, agent.endpoint, caller_channel_id
        );
        let params = OriginateParams {
            channel_id: leg_channel_id.clone(),
            endpoint: agent.endpoint,
            caller_id: context.caller_number.clone(),
            app_name: self.config.ari.app_name.clone(),
            app_args: vec![AGENT_LEG_ARG.to_string()],
            timeout_seconds: AGENT_ANSWER_TIMEOUT_SECONDS,
        };
        if let Err(e) = self.media.originate(&params).await {
            warn!("Origination to agent {} failed: {}", agent_id, e);
            self.restore_agent_available(cc, agent_id).await;
            self.remove_context(&leg_channel_id);
            self.update_context(caller_channel_id, |c| {
                c.agent_id = None;
                c.peer_channel_id = None;
            });
            self.enqueue_caller(caller_channel_id).await;
            return false;
        }
        true
    }

    /// Park a caller in its queue with on-hold media
    ///
    /// The first enqueue stamps the wait-start instant; re-queues keep it,
    /// so wait time is measured from when the caller first started waiting.
    /// The record is removed before being re-added: a channel sits in at
    /// most one queue with at most one record.
    pub(super) async fn enqueue_caller(&self, channel_id: &str) {
        let Some(context) = self.context_snapshot(channel_id) else {
            return;
        };
        if !context.is_live() {
            return;
        }
        let cc = &context.call_center_id;

        let record = WaitingCall {
            channel_id: channel_id.to_string(),
            caller_number: context.caller_number.clone(),
            enqueue_time: context.enqueue_time.unwrap_or_else(Utc::now),
        };
        let _ = self
            .repository
            .remove_call_from_queue(cc, &context.queue_id, &record)
            .await;
        if let Err(e) = self
            .repository
            .add_call_to_queue(cc, &context.queue_id, &record)
            .await
        {
            warn!("Could not queue caller {} ({}), dropping call", channel_id, e);
            self.safe_hangup(channel_id).await;
            self.update_context(channel_id, |c| c.state = ChannelState::Terminated);
            return;
        }

        self.update_context(channel_id, |c| {
            c.state = ChannelState::Queued;
            c.agent_id = None;
            c.peer_channel_id = None;
            c.enqueue_time = Some(record.enqueue_time);
        });
        info!("🎶 Caller {} queued in {} with on-hold media", channel_id, context.queue_id);
        if let Err(e) = self.media.start_hold_music(channel_id).await {
            warn!("On-hold media on {} failed: {}", channel_id, e);
        }
    }

    /// An originated agent leg entered the application (the agent answered)
    pub(super) async fn on_agent_leg_entered(&self, channel: ChannelInfo) {
        let leg_channel_id = channel.id.clone();
        let Some(leg_context) = self.context_snapshot(&leg_channel_id) else {
            warn!("Unknown agent leg {} entered, hanging it up", leg_channel_id);
            self.safe_hangup(&leg_channel_id).await;
            return;
        };
        let cc = leg_context.call_center_id.clone();
        let agent_id = leg_context.agent_id.clone();
        let caller_channel_id = leg_context.peer_channel_id.clone().unwrap_or_default();

        let caller_live = self
            .context_snapshot(&caller_channel_id)
            .map(|c| c.is_live())
            .unwrap_or(false);
        if !caller_live {
            info!("Caller {} is gone, releasing agent leg {}", caller_channel_id, leg_channel_id);
            self.update_context(&leg_channel_id, |c| c.state = ChannelState::AgentGone);
            self.safe_hangup(&leg_channel_id).await;
            if let Some(agent_id) = &agent_id {
                self.restore_agent_available(&cc, agent_id).await;
            }
            return;
        }

        if !channel.is_answered() {
            if let Err(e) = self.media.answer(&leg_channel_id).await {
                warn!("Agent leg {} answer failed ({}), dropping caller {}", leg_channel_id, e, caller_channel_id);
                self.update_context(&caller_channel_id, |c| c.state = ChannelState::Terminated);
                self.safe_hangup(&caller_channel_id).await;
                self.update_context(&leg_channel_id, |c| c.state = ChannelState::AgentGone);
                self.safe_hangup(&leg_channel_id).await;
                if let Some(agent_id) = &agent_id {
                    self.restore_agent_available(&cc, agent_id).await;
                }
                return;
            }
        }
        self.update_context(&leg_channel_id, |c| c.state = ChannelState::AgentAnswered);
        self.update_context(&caller_channel_id, |c| c.state = ChannelState::Bridging);

        // Callers pulled out of a queue still have on-hold media running.
        if self
            .context_snapshot(&caller_channel_id)
            .and_then(|c| c.enqueue_time)
            .is_some()
        {
            if let Err(e) = self.media.stop_hold_music(&caller_channel_id).await {
                warn!("Stopping on-hold media on {} failed: {}", caller_channel_id, e);
            }
        }

        let bridge_id = match self.media.create_bridge().await {
            Ok(bridge_id) => bridge_id,
            Err(e) => {
                warn!("Bridge creation for {} failed: {}", caller_channel_id, e);
                self.abort_bridging(&caller_channel_id, &leg_channel_id, &cc, agent_id.as_ref(), None)
                    .await;
                return;
            }
        };
        if let Err(e) = self
            .media
            .add_channels_to_bridge(
                &bridge_id,
                &[caller_channel_id.clone(), leg_channel_id.clone()],
            )
            .await
        {
            warn!("Adding channels to bridge {} failed: {}", bridge_id, e);
            self.abort_bridging(&caller_channel_id, &leg_channel_id, &cc, agent_id.as_ref(), Some(&bridge_id))
                .await;
            return;
        }

        self.update_context(&caller_channel_id, |c| {
            c.state = ChannelState::Bridged;
            c.bridge_id = Some(bridge_id.clone());
        });
        self.update_context(&leg_channel_id, |c| {
            c.state = ChannelState::AgentBridged;
            c.bridge_id = Some(bridge_id.clone());
        });
        if let Some(agent_id) = &agent_id {
            if let Err(e) = self
                .repository
                .set_agent_status(
                    &cc,
                    agent_id.as_ref(),
                    AgentStatus::OnCall,
                    Some(&StatusContext::bound_to(&caller_channel_id)),
                )
                .await
            {
                warn!("Could not mark agent {} on call: {}", agent_id, e);
            }
        }
        info!(
            "🌉 Caller {} bridged to agent leg {} in {}",
            caller_channel_id, leg_channel_id, bridge_id
        );
    }

    /// Tear down a half-built bridge and both legs
    async fn abort_bridging(
        &self,
        caller_channel_id: &str,
        leg_channel_id: &str,
        cc: &str,
        agent_id: Option<&AgentId>,
        bridge_id: Option<&str>,
    ) {
        if let Some(bridge_id) = bridge_id {
            if let Err(e) = self.media.destroy_bridge(bridge_id).await {
                warn!("Destroying bridge {} failed: {}", bridge_id, e);
            }
        }
        self.update_context(caller_channel_id, |c| c.state = ChannelState::Terminated);
        self.safe_hangup(caller_channel_id).await;
        self.update_context(leg_channel_id, |c| c.state = ChannelState::AgentGone);
        self.safe_hangup(leg_channel_id).await;
        if let Some(agent_id) = agent_id {
            self.restore_agent_available(cc, agent_id).await;
        }
    }
}
