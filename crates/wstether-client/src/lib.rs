//! wsTether client library entry.
//!
//! This crate wires the transport, the connection state machine, inbound
//! dispatch and the chat service into one client stack. It is consumed by the
//! command-line binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod dispatch;
pub mod realtime;
pub mod services;
pub mod session;
pub mod transport;

pub use realtime::{ConnectionManager, ConnectionStatus, StatusObserver};
pub use services::{ChatClient, ChatEvent};
