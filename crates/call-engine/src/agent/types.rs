//! Core types for agent management

use std::fmt;

use serde::{Deserialize, Serialize};

/// Agent status enumeration
///
/// Exactly one status holds per agent at any instant. Transitions are
/// restricted to the serving lifecycle: login makes an agent available,
/// selection moves it to ringing, a bridged call to on-call, teardown to
/// wrap-up or back to available. Logout is reachable from every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    /// Agent is not serving any queue
    LoggedOut,

    /// Agent is logged in and selectable
    Available,

    /// An agent leg is being originated for a caller
    Ringing,

    /// Agent is bridged to a caller
    OnCall,

    /// Post-call wrap-up; not selectable until the wrap timer elapses
    WrappingUp,
}

impl AgentStatus {
    /// Check whether a transition is allowed by the agent lifecycle
    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        use AgentStatus::*;

        // Logout is allowed from every state.
        if next == LoggedOut {
            return true;
        }
        match (self, next) {
            (LoggedOut, Available) => true,
            (Available, Ringing) => true,
            (Ringing, OnCall) => true,
            // Origination error, answer timeout, or agent leg destroyed.
            (Ringing, Available) => true,
            (OnCall, WrappingUp) => true,
            (OnCall, Available) => true,
            (WrappingUp, Available) => true,
            _ => false,
        }
    }

    /// True when the agent can be handed a new call
    pub fn is_selectable(&self) -> bool {
        matches!(self, AgentStatus::Available)
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOGGED_OUT" => Ok(AgentStatus::LoggedOut),
            "AVAILABLE" => Ok(AgentStatus::Available),
            "RINGING" => Ok(AgentStatus::Ringing),
            "ON_CALL" => Ok(AgentStatus::OnCall),
            "WRAPPING_UP" => Ok(AgentStatus::WrappingUp),
            _ => Err(format!("Unknown agent status: {}", s)),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AgentStatus::LoggedOut => "LOGGED_OUT",
            AgentStatus::Available => "AVAILABLE",
            AgentStatus::Ringing => "RINGING",
            AgentStatus::OnCall => "ON_CALL",
            AgentStatus::WrappingUp => "WRAPPING_UP",
        };
        write!(f, "{}", text)
    }
}

/// Agent information and profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent identifier
    pub id: AgentId,

    /// Human-readable agent name
    pub name: String,

    /// Opaque address handed to the media server when originating a leg
    pub endpoint: String,

    /// Shift window rule string (timing rule language)
    pub shift_timings: String,

    /// Current agent status
    pub status: AgentStatus,

    /// Queues this agent currently serves; empty when logged out
    pub logged_in_queues: Vec<String>,
}

/// Agent identifier type for strongly-typed agent references
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        AgentId(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        AgentId(s.to_string())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            AgentStatus::LoggedOut,
            AgentStatus::Available,
            AgentStatus::Ringing,
            AgentStatus::OnCall,
            AgentStatus::WrappingUp,
        ] {
            let text = status.to_string();
            assert_eq!(AgentStatus::from_str(&text).unwrap(), status);
        }
        assert!(AgentStatus::from_str("BUSY").is_err());
    }

    #[test]
    fn lifecycle_transitions() {
        use AgentStatus::*;

        assert!(LoggedOut.can_transition_to(Available));
        assert!(Available.can_transition_to(Ringing));
        assert!(Ringing.can_transition_to(OnCall));
        assert!(Ringing.can_transition_to(Available));
        assert!(OnCall.can_transition_to(WrappingUp));
        assert!(OnCall.can_transition_to(Available));
        assert!(WrappingUp.can_transition_to(Available));

        // Logout always works.
        assert!(OnCall.can_transition_to(LoggedOut));
        assert!(Ringing.can_transition_to(LoggedOut));

        // Skipping the lifecycle does not.
        assert!(!LoggedOut.can_transition_to(Ringing));
        assert!(!Available.can_transition_to(OnCall));
        assert!(!WrappingUp.can_transition_to(Ringing));
    }
}
