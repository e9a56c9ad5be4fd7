use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::transport::OpenRequest;

/// `Failed` reason when the handshake outlives its deadline.
pub const REASON_TIMEOUT: &str = "timeout";
/// `Failed` reason when the handshake was rejected or the socket died while opening.
pub const REASON_HANDSHAKE: &str = "handshake failed";
/// `Failed` reason after a non-graceful close of a live connection.
pub const REASON_ABNORMAL_CLOSE: &str = "abnormal close";
/// `Failed` reason after an I/O error on a live connection.
pub const REASON_TRANSPORT: &str = "transport failure";

/// Published connection status. Exactly one value is current at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed {
        reason: String,
        cause: Option<String>,
    },
}

impl ConnectionStatus {
    pub fn failed(reason: impl Into<String>, cause: Option<String>) -> Self {
        ConnectionStatus::Failed {
            reason: reason.into(),
            cause,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting)
    }

    /// Short label for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Failed {
                reason,
                cause: Some(cause),
            } => write!(f, "failed: {reason} ({cause})"),
            ConnectionStatus::Failed { reason, cause: None } => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Endpoint and credential of the session being (re)established.
#[derive(Clone)]
pub(crate) struct ConnectTarget {
    endpoint: String,
    credential: SecretString,
}

impl ConnectTarget {
    pub(crate) fn new(endpoint: impl Into<String>, credential: SecretString) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential,
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Handshake request with the bearer token attached.
    pub(crate) fn open_request(&self) -> OpenRequest {
        OpenRequest {
            url: self.endpoint.clone(),
            headers: vec![(
                "Authorization".to_string(),
                format!("Bearer {}", self.credential.expose_secret()),
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_status_renders_reason_and_cause() {
        let s = ConnectionStatus::failed(REASON_ABNORMAL_CLOSE, Some("code 1006".into()));
        assert_eq!(s.to_string(), "failed: abnormal close (code 1006)");
        assert_eq!(ConnectionStatus::failed(REASON_TIMEOUT, None).to_string(), "failed: timeout");
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
    }

    #[test]
    fn open_request_attaches_bearer_token() {
        let target = ConnectTarget::new("wss://chat.example/ws", SecretString::new("tok".into()));
        let req = target.open_request();
        assert_eq!(req.url, "wss://chat.example/ws");
        assert_eq!(req.header("Authorization"), Some("Bearer tok"));
    }
}
