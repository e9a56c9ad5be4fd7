//! Realtime connection layer: one managed socket, its published status and
//! the room membership multiplexed over it.

pub mod core;
pub mod types;

pub use self::core::{
    heartbeat, manager, membership, reconnect, status_feed, ConnectionManager, ReconnectPolicy,
    RetryState, RoomMembership, StatusFeed, StatusObserver,
};
pub use types::{
    ConnectionStatus, REASON_ABNORMAL_CLOSE, REASON_HANDSHAKE, REASON_TIMEOUT, REASON_TRANSPORT,
};
