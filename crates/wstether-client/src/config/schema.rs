use std::time::Duration;

use serde::Deserialize;
use wstether_core::error::{Result, TetherError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub client: ClientSection,

    /// Rooms the command-line client joins after connecting.
    #[serde(default)]
    pub rooms: Vec<String>,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TetherError::UnsupportedVersion);
        }
        if self.rooms.iter().any(|r| r.trim().is_empty()) {
            return Err(TetherError::BadConfig("rooms must not contain empty ids".into()));
        }

        self.client.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Per-subscriber inbound buffer (drop-oldest when full).
    #[serde(default = "default_inbound_buffer")]
    pub inbound_buffer: usize,

    #[serde(default)]
    pub reconnect: ReconnectSection,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token_env: default_token_env(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            inbound_buffer: default_inbound_buffer(),
            reconnect: ReconnectSection::default(),
        }
    }
}

impl ClientSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(TetherError::BadConfig(
                "client.endpoint must be a ws:// or wss:// url".into(),
            ));
        }
        if self.token_env.trim().is_empty() {
            return Err(TetherError::BadConfig("client.token_env must not be empty".into()));
        }
        if !(1000..=120000).contains(&self.handshake_timeout_ms) {
            return Err(TetherError::BadConfig(
                "client.handshake_timeout_ms must be between 1000 and 120000".into(),
            ));
        }
        if !(1000..=300000).contains(&self.heartbeat_interval_ms) {
            return Err(TetherError::BadConfig(
                "client.heartbeat_interval_ms must be between 1000 and 300000".into(),
            ));
        }
        if !(1..=65536).contains(&self.inbound_buffer) {
            return Err(TetherError::BadConfig(
                "client.inbound_buffer must be between 1 and 65536".into(),
            ));
        }

        self.reconnect.validate()?;

        Ok(())
    }

    /// Never zero, even for a section that skipped `validate()`.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms.max(1))
    }

    /// Never zero, even for a section that skipped `validate()`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectSection {
    /// When false, an abnormal close settles straight to Disconnected.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Re-open sockets with the endpoint and credential of the last `connect`.
    /// When false the policy only waits out its schedule (giving the
    /// application a chance to reconnect) and then settles to Disconnected.
    #[serde(default = "default_true")]
    pub reopen: bool,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            enabled: true,
            reopen: true,
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.max_attempts) {
            return Err(TetherError::BadConfig(
                "client.reconnect.max_attempts must be between 1 and 100".into(),
            ));
        }
        if self.initial_delay_ms == 0 {
            return Err(TetherError::BadConfig(
                "client.reconnect.initial_delay_ms must be greater than 0".into(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(TetherError::BadConfig(
                "client.reconnect.max_delay_ms must be >= initial_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:8080/chat".into()
}
fn default_token_env() -> String {
    "WSTETHER_TOKEN".into()
}
fn default_handshake_timeout_ms() -> u64 {
    10000
}
fn default_heartbeat_interval_ms() -> u64 {
    30000
}
fn default_inbound_buffer() -> usize {
    100
}
fn default_true() -> bool {
    true
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30000
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let section = ClientSection::default();
        assert!(section.validate().is_ok());
        assert_eq!(section.reconnect.max_delay(), Duration::from_secs(30));
    }

    #[test]
    fn zero_initial_delay_is_rejected() {
        let mut section = ClientSection::default();
        section.reconnect.initial_delay_ms = 0;
        let err = section.validate().unwrap_err();
        assert!(err.to_string().contains("initial_delay_ms"));
    }

    #[test]
    fn endpoint_scheme_is_checked() {
        let mut section = ClientSection::default();
        section.endpoint = "wss://chat.example.com/ws".into();
        assert!(section.validate().is_ok());
        section.endpoint = "https://chat.example.com".into();
        assert!(section.validate().is_err());
    }

    #[test]
    fn zero_durations_never_reach_the_timers() {
        let mut section = ClientSection::default();
        section.heartbeat_interval_ms = 0;
        section.handshake_timeout_ms = 0;
        assert!(section.validate().is_err());
        assert_eq!(section.heartbeat_interval(), Duration::from_millis(1));
        assert_eq!(section.handshake_timeout(), Duration::from_millis(1));
    }
}
