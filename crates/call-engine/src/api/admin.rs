//! Administrative API for call center management
//!
//! Thin facade over the repository for the admin flows that create queues
//! and agents and move agents in and out of service. Login goes through
//! here rather than straight to the repository because a successful login
//! makes an agent available, and availability must wake the router's
//! queue dispatch.

use std::sync::Arc;

use chrono::Utc;

use crate::agent::{Agent, AgentId};
use crate::error::Result;
use crate::orchestrator::CallCenterEngine;
use crate::queue::{Queue, QueueStrategy};

/// Administrative operations on queues and agents
#[derive(Clone)]
pub struct AdminApi {
    engine: Arc<CallCenterEngine>,
}

impl AdminApi {
    /// Create an admin facade over the engine
    pub fn new(engine: Arc<CallCenterEngine>) -> Self {
        Self { engine }
    }

    /// Create a queue
    pub async fn create_queue(
        &self,
        call_center_id: &str,
        queue_id: &str,
        name: &str,
        strategy: QueueStrategy,
        timings: &str,
    ) -> Result<()> {
        self.engine
            .repository()
            .create_queue(call_center_id, queue_id, name, strategy, timings)
            .await
    }

    /// Load a queue record
    pub async fn queue_details(&self, call_center_id: &str, queue_id: &str) -> Result<Queue> {
        self.engine.repository().queue_details(call_center_id, queue_id).await
    }

    /// Create an agent
    pub async fn add_agent(
        &self,
        call_center_id: &str,
        agent_id: &str,
        name: &str,
        endpoint: &str,
        shift_timings: &str,
    ) -> Result<()> {
        self.engine
            .repository()
            .add_agent(call_center_id, agent_id, name, endpoint, shift_timings)
            .await
    }

    /// Load an agent record
    pub async fn agent_details(&self, call_center_id: &str, agent_id: &str) -> Result<Agent> {
        self.engine.repository().agent_details(call_center_id, agent_id).await
    }

    /// Log an agent into queues and dispatch any waiting calls to it
    pub async fn agent_login(
        &self,
        call_center_id: &str,
        agent_id: &str,
        queue_ids: &[String],
        force_login: bool,
    ) -> Result<Agent> {
        let agent = self
            .engine
            .repository()
            .agent_login(call_center_id, agent_id, queue_ids, force_login, &Utc::now())
            .await?;
        self.engine
            .agent_became_available(call_center_id, &AgentId::from(agent_id))
            .await;
        Ok(agent)
    }

    /// Log an agent out of every queue it serves
    pub async fn agent_logout(&self, call_center_id: &str, agent_id: &str) -> Result<()> {
        self.engine.repository().agent_logout(call_center_id, agent_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::agent::AgentStatus;
    use crate::config::CallCenterConfig;
    use crate::media::mock::MockMediaClient;
    use crate::repository::CallCenterRepository;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn admin_provisions_and_cycles_an_agent() {
        let repository = CallCenterRepository::new(Arc::new(MemoryStore::new()));
        let engine = CallCenterEngine::new(
            CallCenterConfig::default(),
            repository.clone(),
            Arc::new(MockMediaClient::new()),
        );
        let admin = AdminApi::new(engine);

        admin
            .create_queue("cc1", "q1", "Support", QueueStrategy::RoundRobin, "24/7")
            .await
            .unwrap();
        admin.add_agent("cc1", "a1", "Alice", "PJSIP/alice", "24/7").await.unwrap();

        assert_eq!(admin.queue_details("cc1", "q1").await.unwrap().name, "Support");

        let agent = admin
            .agent_login("cc1", "a1", &["q1".to_string()], false)
            .await
            .unwrap();
        assert_eq!(agent.status, AgentStatus::Available);
        assert_eq!(agent.logged_in_queues, vec!["q1".to_string()]);

        admin.agent_logout("cc1", "a1").await.unwrap();
        assert_eq!(
            admin.agent_details("cc1", "a1").await.unwrap().status,
            AgentStatus::LoggedOut
        );
    }
}
