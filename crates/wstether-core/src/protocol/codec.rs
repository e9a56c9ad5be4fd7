//! Envelope <-> text frame codec.

use crate::error::{Result, TetherError};
use crate::protocol::envelope::Envelope;

/// Serialize an envelope into a text frame.
pub fn encode(env: &Envelope) -> Result<String> {
    serde_json::to_string(env).map_err(|e| TetherError::Encode(format!("envelope json: {e}")))
}

/// Parse a text frame into an envelope.
///
/// Unknown fields are ignored; a missing or non-string `type` is an error.
pub fn decode(frame: &str) -> Result<Envelope> {
    serde_json::from_str(frame)
        .map_err(|e| TetherError::Decode(format!("invalid envelope json: {e}")))
}
