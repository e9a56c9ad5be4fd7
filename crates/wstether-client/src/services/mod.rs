//! Application-facing services built on the connection manager.

pub mod chat;

pub use chat::{ChatClient, ChatEvent};
