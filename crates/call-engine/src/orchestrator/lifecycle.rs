//! Call teardown, wrap-up, and availability dispatch
//!
//! Channels leave the application or are destroyed at any point in their
//! lifecycle; one handler inspects the channel's last known state and
//! applies the matching recovery. Agents coming back to available (after a
//! call, after wrap-up, after login) trigger a scan of their queues so
//! waiting callers are dispatched without a new inbound event.

use chrono::Utc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::agent::{AgentId, AgentStatus};
use crate::queue::WaitingCall;
use crate::repository::StatusContext;

use super::core::CallCenterEngine;
use super::types::{CallContext, CallRole, ChannelState};

impl CallCenterEngine {
    /// A channel left the application or was destroyed
    ///
    /// Both events funnel here; the first one to arrive does the recovery
    /// work and removes the context, the second finds nothing and is a
    /// no-op.
    pub(super) async fn on_channel_gone(&self, channel_id: &str) {
        let Some(context) = self.remove_context(channel_id) else {
            return;
        };
        debug!("Channel {} gone in state {:?}", channel_id, context.state);

        match context.role {
            CallRole::Caller => self.on_caller_gone(&context).await,
            CallRole::AgentLeg => self.on_agent_leg_gone(&context).await,
        }
    }

    async fn on_caller_gone(&self, context: &CallContext) {
        let cc = &context.call_center_id;

        // Remove any waiting record; a no-op for bridged or never-queued
        // callers, and idempotent when the queue raced us.
        if let Some(enqueue_time) = context.enqueue_time {
            let record = WaitingCall {
                channel_id: context.channel_id.clone(),
                caller_number: context.caller_number.clone(),
                enqueue_time,
            };
            match self
                .repository
                .remove_call_from_queue(cc, &context.queue_id, &record)
                .await
            {
                Ok(removed) if removed > 0 => {
                    info!("🧹 Caller {} left queue {} while waiting", context.channel_id, context.queue_id);
                }
                Ok(_) => {}
                Err(e) => warn!("Waiting record cleanup for {} failed: {}", context.channel_id, e),
            }
        }

        match context.state {
            ChannelState::Originating | ChannelState::Bridging => {
                // The agent leg is still in flight; release it and the agent.
                if let Some(leg_channel_id) = &context.peer_channel_id {
                    self.update_context(leg_channel_id, |c| c.state = ChannelState::AgentGone);
                    self.safe_hangup(leg_channel_id).await;
                }
                if let Some(bridge_id) = &context.bridge_id {
                    if let Err(e) = self.media.destroy_bridge(bridge_id).await {
                        warn!("Destroying bridge {} failed: {}", bridge_id, e);
                    }
                }
                if let Some(agent_id) = &context.agent_id {
                    self.restore_agent_available(cc, agent_id).await;
                }
            }
            ChannelState::Bridged => {
                info!("📴 Caller {} hung up a bridged call", context.channel_id);
                if let Some(leg_channel_id) = &context.peer_channel_id {
                    self.update_context(leg_channel_id, |c| c.state = ChannelState::AgentGone);
                    self.safe_hangup(leg_channel_id).await;
                }
                if let Some(bridge_id) = &context.bridge_id {
                    if let Err(e) = self.media.destroy_bridge(bridge_id).await {
                        warn!("Destroying bridge {} failed: {}", bridge_id, e);
                    }
                }
                if let Some(agent_id) = &context.agent_id {
                    self.finish_call_for_agent(cc, agent_id).await;
                }
            }
            // Queued, pre-routing, or already torn down by the router.
            _ => {}
        }
    }

    async fn on_agent_leg_gone(&self, context: &CallContext) {
        let cc = &context.call_center_id;
        let Some(agent_id) = context.agent_id.clone() else {
            return;
        };

        match context.state {
            ChannelState::AgentOriginated | ChannelState::AgentAnswered => {
                // Origination error, answer timeout, or the agent leg died
                // before the bridge came up.
                info!("☎️ Agent leg {} for {} ended before bridging", context.channel_id, agent_id);
                if let Some(bridge_id) = &context.bridge_id {
                    if let Err(e) = self.media.destroy_bridge(bridge_id).await {
                        warn!("Destroying bridge {} failed: {}", bridge_id, e);
                    }
                }
                self.restore_agent_available(cc, &agent_id).await;

                // The caller is still live: put it back in the queue.
                if let Some(caller_channel_id) = &context.peer_channel_id {
                    let caller_live = self
                        .context_snapshot(caller_channel_id)
                        .map(|c| c.is_live())
                        .unwrap_or(false);
                    if caller_live {
                        self.enqueue_caller(caller_channel_id).await;
                    }
                }
            }
            ChannelState::AgentBridged => {
                info!("📴 Agent {} hung up a bridged call", agent_id);
                if let Some(bridge_id) = &context.bridge_id {
                    if let Err(e) = self.media.destroy_bridge(bridge_id).await {
                        warn!("Destroying bridge {} failed: {}", bridge_id, e);
                    }
                }
                if let Some(caller_channel_id) = &context.peer_channel_id {
                    self.update_context(caller_channel_id, |c| c.state = ChannelState::Terminated);
                    self.safe_hangup(caller_channel_id).await;
                }
                self.finish_call_for_agent(cc, &agent_id).await;
            }
            // Already handled from the caller side.
            _ => {}
        }
    }

    /// Put an agent back into rotation after a ringing attempt failed
    ///
    /// Deliberately does not trigger availability dispatch: re-offering the
    /// head waiting call to the agent that just failed to answer would ring
    /// it in a tight loop. The rotation pointer has already moved on.
    pub(super) async fn restore_agent_available(&self, cc: &str, agent_id: &AgentId) {
        if let Err(e) = self
            .repository
            .set_agent_status(cc, agent_id.as_ref(), AgentStatus::Available, None)
            .await
        {
            warn!("Could not restore agent {} to available: {}", agent_id, e);
        }
    }

    /// Move an agent out of a finished call
    ///
    /// With wrap-up configured the agent parks in wrap-up and a router-owned
    /// timer returns it to available; otherwise it is available immediately.
    /// Either way, becoming available triggers queue dispatch.
    pub(super) async fn finish_call_for_agent(&self, cc: &str, agent_id: &AgentId) {
        let wrap_up_seconds = self.config.general.wrap_up_seconds;
        if wrap_up_seconds > 0 {
            let status_context = StatusContext {
                channel_id: None,
                wrap_up_seconds: Some(wrap_up_seconds),
            };
            match self
                .repository
                .set_agent_status(cc, agent_id.as_ref(), AgentStatus::WrappingUp, Some(&status_context))
                .await
            {
                Ok(()) => {
                    // Weak handle: the timer must not keep a shut-down
                    // engine alive.
                    let engine_ref = self.self_ref.clone();
                    let cc = cc.to_string();
                    let agent_id = agent_id.clone();
                    tokio::spawn(async move {
                        sleep(Duration::from_secs(wrap_up_seconds)).await;
                        let Some(engine) = engine_ref.upgrade() else {
                            return;
                        };
                        match engine
                            .repository
                            .set_agent_status(&cc, agent_id.as_ref(), AgentStatus::Available, None)
                            .await
                        {
                            Ok(()) => {
                                info!("⏰ Agent {} finished wrap-up", agent_id);
                                engine.agent_became_available(&cc, &agent_id).await;
                            }
                            // The agent logged out during wrap-up.
                            Err(e) => debug!("Wrap-up expiry for {} skipped: {}", agent_id, e),
                        }
                    });
                }
                Err(e) => warn!("Could not move agent {} to wrap-up: {}", agent_id, e),
            }
        } else {
            match self
                .repository
                .set_agent_status(cc, agent_id.as_ref(), AgentStatus::Available, None)
                .await
            {
                Ok(()) => self.agent_became_available(cc, agent_id).await,
                Err(e) => warn!("Could not release agent {} after call: {}", agent_id, e),
            }
        }
    }

    /// Dispatch waiting calls now that an agent is available
    ///
    /// Scans the agent's queues in lexicographic order. Each head waiting
    /// call is popped and offered through the selector, so rotation order
    /// is respected even when the trigger agent is not the one selected.
    /// The scan stops as soon as the trigger agent is ringing.
    pub async fn agent_became_available(&self, cc: &str, agent_id: &AgentId) {
        let agent = match self.repository.agent_details(cc, agent_id.as_ref()).await {
            Ok(agent) => agent,
            Err(e) => {
                warn!("Availability dispatch for {} skipped: {}", agent_id, e);
                return;
            }
        };
        if agent.status != AgentStatus::Available {
            return;
        }

        let mut queue_ids = agent.logged_in_queues.clone();
        queue_ids.sort();

        for queue_id in queue_ids {
            loop {
                // Stop once this agent is taken; remaining queues will be
                // drained by the next availability event.
                match self.repository.agent_details(cc, agent_id.as_ref()).await {
                    Ok(agent) if agent.status == AgentStatus::Available => {}
                    _ => return,
                }

                let waiting = match self.repository.next_call_from_queue(cc, &queue_id).await {
                    Ok(Some(waiting)) => waiting,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Queue {} scan failed: {}", queue_id, e);
                        break;
                    }
                };

                let caller_queued = self
                    .context_snapshot(&waiting.channel_id)
                    .map(|c| c.state == ChannelState::Queued)
                    .unwrap_or(false);
                if !caller_queued {
                    // Stale record: the caller is gone or already being
                    // handled. Drop it and look at the next one.
                    debug!("Discarding stale waiting record for {}", waiting.channel_id);
                    continue;
                }

                let now = Utc::now();
                let Some(selected) = self.selector.select(cc, &queue_id, &now).await else {
                    // Nobody is eligible after all; put the call back.
                    if let Err(e) = self.repository.add_call_to_queue(cc, &queue_id, &waiting).await {
                        warn!("Could not restore waiting record for {}: {}", waiting.channel_id, e);
                    }
                    break;
                };
                info!(
                    "📬 Dispatching waiting caller {} from {} to agent {}",
                    waiting.channel_id, queue_id, selected
                );
                if !self.offer_call_to_agent(&waiting.channel_id, &selected).await {
                    // The caller went back into the queue; retrying now
                    // would just pop the same record again.
                    break;
                }
            }
        }
    }
}
