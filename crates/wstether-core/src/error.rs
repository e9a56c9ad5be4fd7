//! Shared error type across wsTether crates.

use thiserror::Error;

/// Stable error codes (safe to log, match on, or forward to a UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Handshake did not complete in time.
    HandshakeTimeout,
    /// Handshake was rejected or the socket failed before opening.
    HandshakeFailure,
    /// Peer closed with a non-graceful code.
    AbnormalClose,
    /// Send attempted while not connected.
    NotConnected,
    /// Transport refused the outbound frame.
    Transport,
    /// Inbound frame could not be decoded.
    Decode,
    /// Outbound envelope could not be encoded.
    Encode,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal invariant broken.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::HandshakeTimeout => "HANDSHAKE_TIMEOUT",
            ErrorCode::HandshakeFailure => "HANDSHAKE_FAILURE",
            ErrorCode::AbnormalClose => "ABNORMAL_CLOSE",
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Decode => "DECODE",
            ErrorCode::Encode => "ENCODE",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Why a `send` did not reach the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendFailure {
    #[error("not connected")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TetherError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum TetherError {
    #[error("handshake timed out")]
    HandshakeTimeout,
    #[error("handshake failed: {0}")]
    HandshakeFailure(String),
    #[error("abnormal close ({code}): {reason}")]
    AbnormalClose { code: u16, reason: String },
    #[error("send failed: {0}")]
    SendFailed(#[from] SendFailure),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl TetherError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            TetherError::HandshakeTimeout => ErrorCode::HandshakeTimeout,
            TetherError::HandshakeFailure(_) => ErrorCode::HandshakeFailure,
            TetherError::AbnormalClose { .. } => ErrorCode::AbnormalClose,
            TetherError::SendFailed(SendFailure::NotConnected) => ErrorCode::NotConnected,
            TetherError::SendFailed(SendFailure::Transport(_)) => ErrorCode::Transport,
            TetherError::Decode(_) => ErrorCode::Decode,
            TetherError::Encode(_) => ErrorCode::Encode,
            TetherError::BadConfig(_) => ErrorCode::BadConfig,
            TetherError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            TetherError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Shorthand for the most common send failure.
    pub fn not_connected() -> Self {
        TetherError::SendFailed(SendFailure::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_failures_map_to_distinct_codes() {
        assert_eq!(TetherError::not_connected().code(), ErrorCode::NotConnected);
        let transport = TetherError::from(SendFailure::Transport("queue closed".into()));
        assert_eq!(transport.code().as_str(), "TRANSPORT");
        assert_eq!(transport.to_string(), "send failed: transport error: queue closed");
    }

    #[test]
    fn abnormal_close_renders_code_and_reason() {
        let err = TetherError::AbnormalClose {
            code: 1006,
            reason: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "abnormal close (1006): connection reset");
        assert_eq!(err.code().as_str(), "ABNORMAL_CLOSE");
    }
}
