//! Connection runtime components.
//!
//! The state machine plus the pieces it drives: status feed, reconnection
//! schedule, heartbeat task and room membership.

pub mod heartbeat;
pub mod manager;
pub mod membership;
pub mod reconnect;
pub mod status_feed;

pub use manager::ConnectionManager;
pub use membership::RoomMembership;
pub use reconnect::{ReconnectPolicy, RetryState};
pub use status_feed::{StatusFeed, StatusObserver};
