//! Round-robin selector implementation

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::agent::{AgentId, AgentStatus};
use crate::error::{CallCenterError, Result};
use crate::repository::CallCenterRepository;
use crate::timing::TimingRules;

/// Round-robin agent selector
///
/// An agent is eligible when it is available, inside its shift window, and
/// logged into the queue. The eligible list is sorted by agent id so the
/// rotation order is deterministic regardless of store iteration order; the
/// pointer names the last selected agent and the next selection takes the
/// following element, wrapping around.
///
/// The pointer advances on every selection, including selections whose
/// origination later fails, so a non-answering agent cannot starve the
/// rest of the rotation. A stale pointer (logged out, off shift, deleted)
/// is ignored and selection restarts at the head of the list.
#[derive(Clone)]
pub struct RoundRobinSelector {
    repository: CallCenterRepository,
}

impl RoundRobinSelector {
    /// Create a selector over the given repository
    pub fn new(repository: CallCenterRepository) -> Self {
        Self { repository }
    }

    /// Pick the next eligible agent for a queue
    ///
    /// Returns `None` when no agent is eligible. Store failures also yield
    /// `None`: the router treats them as "no agent right now" and queues
    /// the caller rather than dropping it.
    pub async fn select(&self, cc: &str, queue_id: &str, now: &DateTime<Utc>) -> Option<AgentId> {
        match self.try_select(cc, queue_id, now).await {
            Ok(selection) => selection,
            Err(e) => {
                warn!("Selection for queue {} degraded to none: {}", queue_id, e);
                None
            }
        }
    }

    async fn try_select(
        &self,
        cc: &str,
        queue_id: &str,
        now: &DateTime<Utc>,
    ) -> Result<Option<AgentId>> {
        let members = self.repository.logged_in_agents(cc, queue_id).await?;

        let mut eligible = Vec::new();
        for member in members {
            let agent = match self.repository.agent_details(cc, member.as_ref()).await {
                Ok(agent) => agent,
                Err(CallCenterError::NotFound(_)) => {
                    // Membership can outlive the agent record; skip it.
                    warn!("Queue {} lists unknown agent {}", queue_id, member);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if agent.status == AgentStatus::Available
                && TimingRules::parse(&agent.shift_timings).admits(now)
            {
                eligible.push(agent.id);
            }
        }

        if eligible.is_empty() {
            debug!("No eligible agent for queue {}", queue_id);
            return Ok(None);
        }
        eligible.sort();

        let pointer = self.repository.last_selected_agent(cc, queue_id).await?;
        let index = match pointer.and_then(|last| eligible.iter().position(|id| *id == last)) {
            Some(position) => (position + 1) % eligible.len(),
            None => 0,
        };

        let selected = eligible[index].clone();
        self.repository
            .set_last_selected_agent(cc, queue_id, &selected)
            .await?;
        debug!("🎯 Queue {} selected agent {}", queue_id, selected);
        Ok(Some(selected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueStrategy;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    const CC: &str = "cc1";

    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    async fn setup(agents: &[&str]) -> (CallCenterRepository, RoundRobinSelector) {
        let repository = CallCenterRepository::new(Arc::new(MemoryStore::new()));
        repository
            .create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7")
            .await
            .unwrap();
        for agent in agents {
            repository
                .add_agent(CC, agent, agent, &format!("PJSIP/{}", agent), "24/7")
                .await
                .unwrap();
            repository
                .agent_login(CC, agent, &["q1".to_string()], false, &monday_morning())
                .await
                .unwrap();
        }
        let selector = RoundRobinSelector::new(repository.clone());
        (repository, selector)
    }

    #[tokio::test]
    async fn empty_queue_selects_none() {
        let (_, selector) = setup(&[]).await;
        assert_eq!(selector.select(CC, "q1", &monday_morning()).await, None);
    }

    #[tokio::test]
    async fn rotation_is_deterministic_and_advances() {
        let (_, selector) = setup(&["a", "b", "c"]).await;
        let now = monday_morning();

        // Pointer unset: first of the sorted list, then round the rotation.
        assert_eq!(selector.select(CC, "q1", &now).await, Some(AgentId::from("a")));
        assert_eq!(selector.select(CC, "q1", &now).await, Some(AgentId::from("b")));
        assert_eq!(selector.select(CC, "q1", &now).await, Some(AgentId::from("c")));
        assert_eq!(selector.select(CC, "q1", &now).await, Some(AgentId::from("a")));
    }

    #[tokio::test]
    async fn non_eligible_agents_are_skipped() {
        let (repository, selector) = setup(&["a", "b", "c"]).await;
        let now = monday_morning();

        repository
            .set_agent_status(CC, "b", AgentStatus::Ringing, None)
            .await
            .unwrap();
        repository
            .set_agent_status(CC, "b", AgentStatus::OnCall, None)
            .await
            .unwrap();

        let mut selections = Vec::new();
        for _ in 0..4 {
            selections.push(selector.select(CC, "q1", &now).await.unwrap());
            let pointer = repository.last_selected_agent(CC, "q1").await.unwrap();
            assert_eq!(pointer.as_ref(), selections.last());
        }
        let expected: Vec<AgentId> =
            ["a", "c", "a", "c"].iter().map(|s| AgentId::from(*s)).collect();
        assert_eq!(selections, expected);
    }

    #[tokio::test]
    async fn stale_pointer_restarts_at_head() {
        let (repository, selector) = setup(&["a", "b"]).await;
        let now = monday_morning();

        // Pointer names an agent that has since logged out.
        repository
            .set_last_selected_agent(CC, "q1", &AgentId::from("b"))
            .await
            .unwrap();
        repository.agent_logout(CC, "b").await.unwrap();

        assert_eq!(selector.select(CC, "q1", &now).await, Some(AgentId::from("a")));
    }

    #[tokio::test]
    async fn off_shift_agents_are_not_eligible() {
        let (repository, selector) = setup(&["a"]).await;

        repository
            .add_agent(CC, "night", "Night Agent", "PJSIP/night", "00:00-06:00;Mon")
            .await
            .unwrap();
        repository
            .agent_login(CC, "night", &["q1".to_string()], true, &monday_morning())
            .await
            .unwrap();

        // Mid-morning the night-shift agent is outside its window.
        assert_eq!(
            selector.select(CC, "q1", &monday_morning()).await,
            Some(AgentId::from("a"))
        );
        assert_eq!(
            selector.select(CC, "q1", &monday_morning()).await,
            Some(AgentId::from("a"))
        );
    }

    #[tokio::test]
    async fn selections_are_fair_over_a_stable_list() {
        let (_, selector) = setup(&["a", "b", "c"]).await;
        let now = monday_morning();

        let mut counts = std::collections::HashMap::new();
        let mut previous: Option<AgentId> = None;
        let rounds = 10;
        for _ in 0..rounds {
            let selected = selector.select(CC, "q1", &now).await.unwrap();
            // No agent is picked twice in a row when others are eligible.
            assert_ne!(Some(&selected), previous.as_ref());
            *counts.entry(selected.clone()).or_insert(0usize) += 1;
            previous = Some(selected);
        }

        // Each agent is selected floor(n/k) or ceil(n/k) times.
        for count in counts.values() {
            assert!(*count == rounds / 3 || *count == rounds / 3 + 1);
        }
    }
}
