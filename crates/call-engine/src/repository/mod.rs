//! Queue and agent repository
//!
//! The repository owns every read and write of call center state in the
//! shared store: queue and agent records, queue membership, waiting-call
//! sequences, and the per-queue rotation pointer. It is the sole encoder
//! and decoder of the JSON text embedded in hash fields (`timings`,
//! `shiftTimings`, `loggedInQueues`) and of waiting-call records; no other
//! component sees raw store values.
//!
//! ## Key schema
//!
//! All keys are scoped by call center id:
//!
//! ```text
//! callcenter:{cc}:queues_master              set of queue ids
//! callcenter:{cc}:agents_master              set of agent ids
//! callcenter:{cc}:queue:{q}                  hash: name, strategy, timings, status
//! callcenter:{cc}:agent:{a}                  hash: name, endpoint, shiftTimings, status, loggedInQueues
//! callcenter:{cc}:queue:{q}:agents_loggedIn  set of agent ids
//! callcenter:{cc}:queue:{q}:calls            list of waiting-call JSON records
//! callcenter:{cc}:queue:{q}:lastAgentRR      string: last selected agent id
//! ```
//!
//! ## Invariants maintained here
//!
//! 1. A logged-out agent has no logged-in queues and appears in no queue's
//!    logged-in set.
//! 2. A serving agent appears in the logged-in set of exactly the queues it
//!    lists.
//!
//! Login and logout touch multiple keys without a store transaction, so a
//! crash between writes can leave the sets inconsistent; [`reconcile`]
//! restores invariant (2) and runs once at startup.
//!
//! [`reconcile`]: CallCenterRepository::reconcile

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentId, AgentStatus};
use crate::error::{CallCenterError, Result};
use crate::queue::{Queue, QueueStatus, QueueStrategy, WaitingCall};
use crate::store::Store;
use crate::timing::TimingRules;

/// Context attached to an agent status transition
///
/// Carries the channel binding when an agent moves to ringing or on-call,
/// and the wrap-up duration when it moves to wrap-up.
#[derive(Debug, Clone, Default)]
pub struct StatusContext {
    /// Caller channel this transition is bound to
    pub channel_id: Option<String>,

    /// Wrap-up duration in seconds
    pub wrap_up_seconds: Option<u64>,
}

impl StatusContext {
    /// Context binding a transition to a caller channel
    pub fn bound_to(channel_id: &str) -> Self {
        Self {
            channel_id: Some(channel_id.to_string()),
            wrap_up_seconds: None,
        }
    }
}

/// Repository over the shared store
///
/// Cheap to clone; concurrent call tasks share the same store handle.
#[derive(Clone)]
pub struct CallCenterRepository {
    store: Arc<dyn Store>,
}

fn queues_master_key(cc: &str) -> String {
    format!("callcenter:{}:queues_master", cc)
}

fn agents_master_key(cc: &str) -> String {
    format!("callcenter:{}:agents_master", cc)
}

fn queue_key(cc: &str, queue_id: &str) -> String {
    format!("callcenter:{}:queue:{}", cc, queue_id)
}

fn agent_key(cc: &str, agent_id: &str) -> String {
    format!("callcenter:{}:agent:{}", cc, agent_id)
}

fn logged_in_key(cc: &str, queue_id: &str) -> String {
    format!("callcenter:{}:queue:{}:agents_loggedIn", cc, queue_id)
}

fn calls_key(cc: &str, queue_id: &str) -> String {
    format!("callcenter:{}:queue:{}:calls", cc, queue_id)
}

fn rotation_key(cc: &str, queue_id: &str) -> String {
    format!("callcenter:{}:queue:{}:lastAgentRR", cc, queue_id)
}

fn encode_json_text(value: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CallCenterError::store(e.to_string()))
}

fn decode_json_text(key: &str, field: &str, raw: &str) -> Result<String> {
    serde_json::from_str(raw).map_err(|_| {
        CallCenterError::store(format!("unparsable field {} in {}: {:?}", field, key, raw))
    })
}

fn required_field<'a>(
    key: &str,
    fields: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| CallCenterError::store(format!("missing field {} in {}", name, key)))
}

impl CallCenterRepository {
    /// Create a repository over the given store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Queues
    // ========================================================================

    /// Create a queue and record it in the queue master set
    ///
    /// The advisory status defaults to closed; operating hours in `timings`
    /// are what actually admit calls.
    pub async fn create_queue(
        &self,
        cc: &str,
        queue_id: &str,
        name: &str,
        strategy: QueueStrategy,
        timings: &str,
    ) -> Result<()> {
        if cc.is_empty() || queue_id.is_empty() {
            return Err(CallCenterError::invalid_input(
                "call center id and queue id are required",
            ));
        }
        info!("📋 Creating queue {} ({}) in call center {}", queue_id, name, cc);

        let key = queue_key(cc, queue_id);
        let fields = vec![
            ("name".to_string(), name.to_string()),
            ("strategy".to_string(), strategy.to_string()),
            ("timings".to_string(), encode_json_text(timings)?),
            ("status".to_string(), QueueStatus::Closed.to_string()),
        ];
        self.store.hash_set_all(&key, &fields).await?;
        self.store.set_add(&queues_master_key(cc), queue_id).await?;
        Ok(())
    }

    /// Load a queue record
    pub async fn queue_details(&self, cc: &str, queue_id: &str) -> Result<Queue> {
        let key = queue_key(cc, queue_id);
        let fields = self.store.hash_get_all(&key).await?;
        if fields.is_empty() {
            return Err(CallCenterError::not_found(format!("Queue not found: {}", queue_id)));
        }

        let timings_raw = required_field(&key, &fields, "timings")?;
        Ok(Queue {
            id: queue_id.to_string(),
            name: required_field(&key, &fields, "name")?.to_string(),
            strategy: QueueStrategy::from(required_field(&key, &fields, "strategy")?),
            timings: decode_json_text(&key, "timings", timings_raw)?,
            status: QueueStatus::from_str(required_field(&key, &fields, "status")?)
                .unwrap_or(QueueStatus::Closed),
        })
    }

    /// All queue ids known to this call center
    pub async fn list_queues(&self, cc: &str) -> Result<Vec<String>> {
        self.store.set_members(&queues_master_key(cc)).await
    }

    /// Evaluate a queue's operating hours at the given instant
    pub async fn is_queue_active(&self, cc: &str, queue_id: &str, now: &DateTime<Utc>) -> Result<bool> {
        let queue = self.queue_details(cc, queue_id).await?;
        Ok(TimingRules::parse(&queue.timings).admits(now))
    }

    // ========================================================================
    // Agents
    // ========================================================================

    /// Create an agent and record it in the agent master set
    ///
    /// Agents start logged out with no queue memberships.
    pub async fn add_agent(
        &self,
        cc: &str,
        agent_id: &str,
        name: &str,
        endpoint: &str,
        shift_timings: &str,
    ) -> Result<()> {
        if cc.is_empty() || agent_id.is_empty() {
            return Err(CallCenterError::invalid_input(
                "call center id and agent id are required",
            ));
        }
        info!("👤 Adding agent {} ({}) to call center {}", agent_id, name, cc);

        let key = agent_key(cc, agent_id);
        let fields = vec![
            ("name".to_string(), name.to_string()),
            ("endpoint".to_string(), endpoint.to_string()),
            ("shiftTimings".to_string(), encode_json_text(shift_timings)?),
            ("status".to_string(), AgentStatus::LoggedOut.to_string()),
            ("loggedInQueues".to_string(), "[]".to_string()),
        ];
        self.store.hash_set_all(&key, &fields).await?;
        self.store.set_add(&agents_master_key(cc), agent_id).await?;
        Ok(())
    }

    /// Load an agent record with embedded fields decoded
    pub async fn agent_details(&self, cc: &str, agent_id: &str) -> Result<Agent> {
        let key = agent_key(cc, agent_id);
        let fields = self.store.hash_get_all(&key).await?;
        if fields.is_empty() {
            return Err(CallCenterError::not_found(format!("Agent not found: {}", agent_id)));
        }

        let status_raw = required_field(&key, &fields, "status")?;
        let status = AgentStatus::from_str(status_raw)
            .map_err(|_| CallCenterError::store(format!("bad status in {}: {:?}", key, status_raw)))?;

        let queues_raw = required_field(&key, &fields, "loggedInQueues")?;
        let logged_in_queues: Vec<String> = serde_json::from_str(queues_raw).map_err(|_| {
            CallCenterError::store(format!("unparsable loggedInQueues in {}: {:?}", key, queues_raw))
        })?;

        let shift_raw = required_field(&key, &fields, "shiftTimings")?;
        Ok(Agent {
            id: AgentId::from(agent_id),
            name: required_field(&key, &fields, "name")?.to_string(),
            endpoint: required_field(&key, &fields, "endpoint")?.to_string(),
            shift_timings: decode_json_text(&key, "shiftTimings", shift_raw)?,
            status,
            logged_in_queues,
        })
    }

    /// All agent ids known to this call center
    pub async fn list_agents(&self, cc: &str) -> Result<Vec<String>> {
        self.store.set_members(&agents_master_key(cc)).await
    }

    /// Evaluate an agent's shift window at the given instant
    pub async fn is_agent_on_shift(&self, cc: &str, agent_id: &str, now: &DateTime<Utc>) -> Result<bool> {
        let agent = self.agent_details(cc, agent_id).await?;
        Ok(TimingRules::parse(&agent.shift_timings).admits(now))
    }

    /// Log an agent into a set of queues
    ///
    /// The agent must exist, be logged out, and either be inside its shift
    /// window or have the check overridden with `force_login`. Queue
    /// memberships are written before the agent record so a crash leaves at
    /// worst extra set members for [`reconcile`] to clean up.
    ///
    /// [`reconcile`]: CallCenterRepository::reconcile
    pub async fn agent_login(
        &self,
        cc: &str,
        agent_id: &str,
        queue_ids: &[String],
        force_login: bool,
        now: &DateTime<Utc>,
    ) -> Result<Agent> {
        if queue_ids.is_empty() {
            return Err(CallCenterError::invalid_input("login requires at least one queue"));
        }

        let agent = self.agent_details(cc, agent_id).await?;
        if agent.status != AgentStatus::LoggedOut {
            return Err(CallCenterError::illegal_state(format!(
                "Agent {} is already logged in ({})",
                agent_id, agent.status
            )));
        }
        if !force_login && !TimingRules::parse(&agent.shift_timings).admits(now) {
            return Err(CallCenterError::illegal_state(format!(
                "Agent {} is outside its shift window",
                agent_id
            )));
        }

        for queue_id in queue_ids {
            self.store.set_add(&logged_in_key(cc, queue_id), agent_id).await?;
        }

        let queues_json = serde_json::to_string(queue_ids)
            .map_err(|e| CallCenterError::store(e.to_string()))?;
        let fields = vec![
            ("status".to_string(), AgentStatus::Available.to_string()),
            ("loggedInQueues".to_string(), queues_json),
        ];
        self.store.hash_set_all(&agent_key(cc, agent_id), &fields).await?;

        info!("✅ Agent {} logged into queues {:?}", agent_id, queue_ids);
        Ok(Agent {
            status: AgentStatus::Available,
            logged_in_queues: queue_ids.to_vec(),
            ..agent
        })
    }

    /// Log an agent out of every queue it serves
    pub async fn agent_logout(&self, cc: &str, agent_id: &str) -> Result<()> {
        let agent = self.agent_details(cc, agent_id).await?;
        if agent.status == AgentStatus::LoggedOut {
            return Err(CallCenterError::illegal_state(format!(
                "Agent {} is not logged in",
                agent_id
            )));
        }

        for queue_id in &agent.logged_in_queues {
            self.store.set_remove(&logged_in_key(cc, queue_id), agent_id).await?;
        }

        let fields = vec![
            ("status".to_string(), AgentStatus::LoggedOut.to_string()),
            ("loggedInQueues".to_string(), "[]".to_string()),
        ];
        self.store.hash_set_all(&agent_key(cc, agent_id), &fields).await?;

        info!("👋 Agent {} logged out", agent_id);
        Ok(())
    }

    /// Transition an agent's status
    ///
    /// Transitions outside the agent lifecycle are rejected with an illegal
    /// state error; queue memberships are untouched.
    pub async fn set_agent_status(
        &self,
        cc: &str,
        agent_id: &str,
        new_status: AgentStatus,
        context: Option<&StatusContext>,
    ) -> Result<()> {
        let agent = self.agent_details(cc, agent_id).await?;
        if !agent.status.can_transition_to(new_status) {
            return Err(CallCenterError::illegal_state(format!(
                "Agent {} cannot move from {} to {}",
                agent_id, agent.status, new_status
            )));
        }

        if let Some(context) = context {
            debug!(
                "Agent {} -> {} (channel: {:?}, wrap: {:?}s)",
                agent_id, new_status, context.channel_id, context.wrap_up_seconds
            );
        }

        let fields = vec![("status".to_string(), new_status.to_string())];
        self.store.hash_set_all(&agent_key(cc, agent_id), &fields).await?;
        info!("🔄 Agent {}: {} -> {}", agent_id, agent.status, new_status);
        Ok(())
    }

    /// Agents currently logged into a queue
    pub async fn logged_in_agents(&self, cc: &str, queue_id: &str) -> Result<Vec<AgentId>> {
        let members = self.store.set_members(&logged_in_key(cc, queue_id)).await?;
        Ok(members.into_iter().map(AgentId::from).collect())
    }

    // ========================================================================
    // Waiting calls
    // ========================================================================

    /// Append a waiting call to the tail of a queue
    pub async fn add_call_to_queue(&self, cc: &str, queue_id: &str, call: &WaitingCall) -> Result<()> {
        let record = serde_json::to_string(call).map_err(|e| CallCenterError::store(e.to_string()))?;
        self.store.list_push_tail(&calls_key(cc, queue_id), &record).await?;
        debug!("Call {} enqueued to {}", call.channel_id, queue_id);
        Ok(())
    }

    /// Remove a waiting call from a queue, returning how many records matched
    ///
    /// Records are matched by value. A channel appears in at most one queue
    /// with one record, so this is removal by channel id in practice, and
    /// calling it again after a successful removal returns zero.
    pub async fn remove_call_from_queue(
        &self,
        cc: &str,
        queue_id: &str,
        call: &WaitingCall,
    ) -> Result<usize> {
        let record = serde_json::to_string(call).map_err(|e| CallCenterError::store(e.to_string()))?;
        let removed = self.store.list_remove(&calls_key(cc, queue_id), &record).await?;
        if removed > 0 {
            debug!("Call {} removed from {} ({} records)", call.channel_id, queue_id, removed);
        }
        Ok(removed)
    }

    /// Pop the head waiting call of a queue
    pub async fn next_call_from_queue(&self, cc: &str, queue_id: &str) -> Result<Option<WaitingCall>> {
        match self.store.list_pop_head(&calls_key(cc, queue_id)).await? {
            Some(record) => {
                let call: WaitingCall = serde_json::from_str(&record).map_err(|_| {
                    CallCenterError::store(format!("unparsable waiting record in {}: {:?}", queue_id, record))
                })?;
                Ok(Some(call))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // Rotation pointer
    // ========================================================================

    /// Agent most recently selected for a queue, if any
    pub async fn last_selected_agent(&self, cc: &str, queue_id: &str) -> Result<Option<AgentId>> {
        let value = self.store.string_get(&rotation_key(cc, queue_id)).await?;
        Ok(value.map(AgentId::from))
    }

    /// Record the agent just selected for a queue
    pub async fn set_last_selected_agent(&self, cc: &str, queue_id: &str, agent_id: &AgentId) -> Result<()> {
        self.store.string_set(&rotation_key(cc, queue_id), agent_id.as_ref()).await
    }

    // ========================================================================
    // Consistency
    // ========================================================================

    /// Restore queue-membership consistency after an unclean shutdown
    ///
    /// Login and logout write several keys without a transaction. This pass
    /// removes set members that should not be there (logged-out or unknown
    /// agents, memberships the agent record does not list) and re-adds
    /// missing ones. Returns the number of repairs made.
    pub async fn reconcile(&self, cc: &str) -> Result<usize> {
        let mut repairs = 0;

        let queue_ids = self.list_queues(cc).await?;
        for queue_id in &queue_ids {
            for member in self.store.set_members(&logged_in_key(cc, queue_id)).await? {
                let keep = match self.agent_details(cc, &member).await {
                    Ok(agent) => {
                        agent.status != AgentStatus::LoggedOut
                            && agent.logged_in_queues.contains(queue_id)
                    }
                    Err(CallCenterError::NotFound(_)) => false,
                    Err(e) => return Err(e),
                };
                if !keep {
                    warn!("🧹 Removing stale member {} from queue {} logged-in set", member, queue_id);
                    self.store.set_remove(&logged_in_key(cc, queue_id), &member).await?;
                    repairs += 1;
                }
            }
        }

        for agent_id in self.list_agents(cc).await? {
            let agent = match self.agent_details(cc, &agent_id).await {
                Ok(agent) => agent,
                Err(CallCenterError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if agent.status == AgentStatus::LoggedOut {
                continue;
            }
            for queue_id in &agent.logged_in_queues {
                let members = self.store.set_members(&logged_in_key(cc, queue_id)).await?;
                if !members.iter().any(|m| m == &agent_id) {
                    warn!("🧹 Restoring missing membership of {} in queue {}", agent_id, queue_id);
                    self.store.set_add(&logged_in_key(cc, queue_id), &agent_id).await?;
                    repairs += 1;
                }
            }
        }

        if repairs > 0 {
            info!("✅ Reconciliation made {} repairs in call center {}", repairs, cc);
        }
        Ok(repairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    const CC: &str = "cc1";

    fn repo() -> CallCenterRepository {
        CallCenterRepository::new(Arc::new(MemoryStore::new()))
    }

    // 2026-01-05 10:00 UTC is a Monday morning.
    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    fn saturday_afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 3, 14, 0, 0).unwrap()
    }

    fn waiting(channel_id: &str) -> WaitingCall {
        WaitingCall {
            channel_id: channel_id.to_string(),
            caller_number: "+15550001".to_string(),
            enqueue_time: monday_morning(),
        }
    }

    #[tokio::test]
    async fn queue_round_trips_with_defaults() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7")
            .await
            .unwrap();

        let queue = repo.queue_details(CC, "q1").await.unwrap();
        assert_eq!(queue.name, "Support");
        assert_eq!(queue.strategy, QueueStrategy::RoundRobin);
        assert_eq!(queue.timings, "24/7");
        assert_eq!(queue.status, QueueStatus::Closed);
        assert_eq!(repo.list_queues(CC).await.unwrap(), vec!["q1".to_string()]);
    }

    #[tokio::test]
    async fn missing_queue_is_not_found() {
        let repo = repo();
        assert!(matches!(
            repo.queue_details(CC, "missing").await,
            Err(CallCenterError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn agent_round_trips_with_defaults() {
        let repo = repo();
        repo.add_agent(CC, "a1", "Alice", "PJSIP/alice", "09:00-17:00;Mon-Fri")
            .await
            .unwrap();

        let agent = repo.agent_details(CC, "a1").await.unwrap();
        assert_eq!(agent.name, "Alice");
        assert_eq!(agent.endpoint, "PJSIP/alice");
        assert_eq!(agent.shift_timings, "09:00-17:00;Mon-Fri");
        assert_eq!(agent.status, AgentStatus::LoggedOut);
        assert!(agent.logged_in_queues.is_empty());
    }

    #[tokio::test]
    async fn login_updates_status_and_memberships() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.create_queue(CC, "q2", "Sales", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.add_agent(CC, "a1", "Alice", "PJSIP/alice", "24/7").await.unwrap();

        repo.agent_login(CC, "a1", &["q1".to_string(), "q2".to_string()], false, &monday_morning())
            .await
            .unwrap();

        let agent = repo.agent_details(CC, "a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Available);
        assert_eq!(agent.logged_in_queues, vec!["q1".to_string(), "q2".to_string()]);
        assert_eq!(repo.logged_in_agents(CC, "q1").await.unwrap(), vec![AgentId::from("a1")]);
        assert_eq!(repo.logged_in_agents(CC, "q2").await.unwrap(), vec![AgentId::from("a1")]);
    }

    #[tokio::test]
    async fn double_login_is_illegal() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.add_agent(CC, "a1", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.agent_login(CC, "a1", &["q1".to_string()], false, &monday_morning()).await.unwrap();

        assert!(matches!(
            repo.agent_login(CC, "a1", &["q1".to_string()], false, &monday_morning()).await,
            Err(CallCenterError::IllegalState(_))
        ));
    }

    #[tokio::test]
    async fn off_shift_login_requires_force() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.add_agent(CC, "a1", "Alice", "PJSIP/alice", "09:00-17:00;Mon-Fri").await.unwrap();

        assert!(matches!(
            repo.agent_login(CC, "a1", &["q1".to_string()], false, &saturday_afternoon()).await,
            Err(CallCenterError::IllegalState(_))
        ));

        repo.agent_login(CC, "a1", &["q1".to_string()], true, &saturday_afternoon())
            .await
            .unwrap();
        let agent = repo.agent_details(CC, "a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Available);
    }

    #[tokio::test]
    async fn logout_clears_memberships() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.add_agent(CC, "a1", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.agent_login(CC, "a1", &["q1".to_string()], false, &monday_morning()).await.unwrap();

        repo.agent_logout(CC, "a1").await.unwrap();

        let agent = repo.agent_details(CC, "a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::LoggedOut);
        assert!(agent.logged_in_queues.is_empty());
        assert!(repo.logged_in_agents(CC, "q1").await.unwrap().is_empty());

        assert!(matches!(
            repo.agent_logout(CC, "a1").await,
            Err(CallCenterError::IllegalState(_))
        ));
    }

    #[tokio::test]
    async fn status_transitions_follow_the_lifecycle() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.add_agent(CC, "a1", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.agent_login(CC, "a1", &["q1".to_string()], false, &monday_morning()).await.unwrap();

        repo.set_agent_status(CC, "a1", AgentStatus::Ringing, Some(&StatusContext::bound_to("chan-1")))
            .await
            .unwrap();
        repo.set_agent_status(CC, "a1", AgentStatus::OnCall, None).await.unwrap();
        repo.set_agent_status(CC, "a1", AgentStatus::WrappingUp, None).await.unwrap();
        repo.set_agent_status(CC, "a1", AgentStatus::Available, None).await.unwrap();

        // Available cannot jump straight to on-call.
        assert!(matches!(
            repo.set_agent_status(CC, "a1", AgentStatus::OnCall, None).await,
            Err(CallCenterError::IllegalState(_))
        ));
    }

    #[tokio::test]
    async fn waiting_calls_are_fifo_and_removal_is_idempotent() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();

        let first = waiting("chan-1");
        let second = waiting("chan-2");
        repo.add_call_to_queue(CC, "q1", &first).await.unwrap();
        repo.add_call_to_queue(CC, "q1", &second).await.unwrap();

        assert_eq!(repo.remove_call_from_queue(CC, "q1", &first).await.unwrap(), 1);
        assert_eq!(repo.remove_call_from_queue(CC, "q1", &first).await.unwrap(), 0);

        let head = repo.next_call_from_queue(CC, "q1").await.unwrap();
        assert_eq!(head, Some(second));
        assert_eq!(repo.next_call_from_queue(CC, "q1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn queue_activity_follows_timings() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "09:00-17:00;Mon-Fri")
            .await
            .unwrap();

        assert!(repo.is_queue_active(CC, "q1", &monday_morning()).await.unwrap());
        assert!(!repo.is_queue_active(CC, "q1", &saturday_afternoon()).await.unwrap());
    }

    #[tokio::test]
    async fn agent_shift_follows_timings() {
        let repo = repo();
        repo.add_agent(CC, "a1", "Alice", "PJSIP/alice", "09:00-17:00;Mon-Fri")
            .await
            .unwrap();

        assert!(repo.is_agent_on_shift(CC, "a1", &monday_morning()).await.unwrap());
        assert!(!repo.is_agent_on_shift(CC, "a1", &saturday_afternoon()).await.unwrap());
    }

    #[tokio::test]
    async fn rotation_pointer_round_trips() {
        let repo = repo();
        assert_eq!(repo.last_selected_agent(CC, "q1").await.unwrap(), None);
        repo.set_last_selected_agent(CC, "q1", &AgentId::from("a2")).await.unwrap();
        assert_eq!(
            repo.last_selected_agent(CC, "q1").await.unwrap(),
            Some(AgentId::from("a2"))
        );
    }

    #[tokio::test]
    async fn reconcile_repairs_membership_drift() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.create_queue(CC, "q2", "Sales", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.add_agent(CC, "a1", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.add_agent(CC, "a2", "Bob", "PJSIP/bob", "24/7").await.unwrap();
        repo.agent_login(CC, "a1", &["q1".to_string()], false, &monday_morning()).await.unwrap();

        // Simulate drift: a logged-out agent left in a set, a missing
        // membership, and an unknown agent id.
        let store = repo.store.clone();
        store.set_add(&logged_in_key(CC, "q1"), "a2").await.unwrap();
        store.set_add(&logged_in_key(CC, "q2"), "ghost").await.unwrap();
        store.set_remove(&logged_in_key(CC, "q1"), "a1").await.unwrap();

        let repairs = repo.reconcile(CC).await.unwrap();
        assert_eq!(repairs, 3);

        assert_eq!(repo.logged_in_agents(CC, "q1").await.unwrap(), vec![AgentId::from("a1")]);
        assert!(repo.logged_in_agents(CC, "q2").await.unwrap().is_empty());

        // A clean state needs no repairs.
        assert_eq!(repo.reconcile(CC).await.unwrap(), 0);
    }
}
