//! Core types for queue management

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Call distribution strategy
///
/// Only round-robin is routable today; other values are carried verbatim so
/// admin tooling can store them ahead of router support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStrategy {
    /// Rotate across eligible agents in deterministic order
    RoundRobin,

    /// Ring every eligible agent at once (reserved)
    RingAll,

    /// Unrecognized strategy, kept as written
    Other(String),
}

impl From<&str> for QueueStrategy {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ROUND_ROBIN" => QueueStrategy::RoundRobin,
            "RINGALL" => QueueStrategy::RingAll,
            _ => QueueStrategy::Other(s.to_string()),
        }
    }
}

impl fmt::Display for QueueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStrategy::RoundRobin => write!(f, "ROUND_ROBIN"),
            QueueStrategy::RingAll => write!(f, "RINGALL"),
            QueueStrategy::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Advisory queue status
///
/// The authoritative open/closed decision is the timing evaluation made on
/// each call; this flag only reflects what admin tooling last wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    Open,
    Closed,
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(QueueStatus::Open),
            "CLOSED" => Ok(QueueStatus::Closed),
            _ => Err(format!("Unknown queue status: {}", s)),
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStatus::Open => write!(f, "OPEN"),
            QueueStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Queue record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queue {
    /// Unique identifier for the queue
    pub id: String,

    /// Human-readable queue name
    pub name: String,

    /// Distribution strategy
    pub strategy: QueueStrategy,

    /// Operating hours rule string (timing rule language)
    pub timings: String,

    /// Advisory status last written by admin tooling
    pub status: QueueStatus,
}

/// A call waiting in a queue
///
/// Serialized as JSON text inside the store's per-queue list. The enqueue
/// time is epoch milliseconds on the wire and survives re-queueing, so wait
/// time is measured from the first enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingCall {
    /// External channel identifier of the caller leg
    pub channel_id: String,

    /// Caller number as reported by the media server
    pub caller_number: String,

    /// Instant of first enqueue
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub enqueue_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn strategy_parses_known_and_preserves_unknown() {
        assert_eq!(QueueStrategy::from("ROUND_ROBIN"), QueueStrategy::RoundRobin);
        assert_eq!(QueueStrategy::from("round_robin"), QueueStrategy::RoundRobin);
        assert_eq!(QueueStrategy::from("RINGALL"), QueueStrategy::RingAll);
        let other = QueueStrategy::from("FEWEST_CALLS");
        assert_eq!(other, QueueStrategy::Other("FEWEST_CALLS".to_string()));
        assert_eq!(other.to_string(), "FEWEST_CALLS");
    }

    #[test]
    fn waiting_call_wire_format_uses_epoch_millis() {
        let call = WaitingCall {
            channel_id: "chan-1".to_string(),
            caller_number: "+15550001".to_string(),
            enqueue_time: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        };
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("\"channelId\":\"chan-1\""));
        assert!(json.contains("\"enqueueTime\":1700000000000"));

        let back: WaitingCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }
}
