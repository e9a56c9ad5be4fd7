//! wsTether core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the wire envelope, its JSON codec, and the error surface
//! shared by the connection client and any tooling that speaks the same
//! protocol. It carries no runtime or socket dependencies so it can be reused
//! by servers, test harnesses, and clients alike.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed frames surface as `TetherError::Decode` so a hostile or buggy
//! peer can never crash the read loop.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

pub use error::{ErrorCode, SendFailure, TetherError};
/// Shared result type.
pub use error::Result;
