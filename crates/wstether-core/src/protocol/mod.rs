//! Protocol modules.
//!
//! - `envelope`: the JSON wire envelope and its kinds.
//! - `codec`: text frame encode/decode.
//!
//! Decoding is panic-free: malformed input is reported as `TetherError`
//! instead of panicking, so the client read loop survives bad traffic.

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode};
pub use envelope::{Envelope, EnvelopeKind};
