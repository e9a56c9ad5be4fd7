//! Inbound dispatch.
//!
//! Decoded envelopes fan out to every subscriber through a bounded
//! drop-oldest buffer, so a slow consumer never stalls the socket read loop.

pub mod dispatcher;

pub use dispatcher::{InboundDispatcher, InboundStream};
