//! Queue domain types
//!
//! A queue is a named entry point with operating hours and a distribution
//! strategy. Its waiting calls form a FIFO sequence in the shared store:
//! enqueued at the tail, dequeued from the head, with a channel present in
//! at most one queue at a time.

pub mod types;

pub use types::{Queue, QueueStatus, QueueStrategy, WaitingCall};
