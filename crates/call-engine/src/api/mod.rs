//! Public APIs
//!
//! Administrative surface for provisioning queues and agents and driving
//! agent login and logout. The routing core itself is driven by channel
//! events, not by these APIs.

pub mod admin;

pub use admin::AdminApi;
