//! Transport boundary.
//!
//! The connection manager depends only on [`Transport`] and [`Socket`]. A
//! transport opens one physical socket per call and reports its lifecycle as
//! [`SocketEvent`]s on the channel it was handed; `ws` holds the bundled
//! `tokio-tungstenite` implementation.

pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wstether_core::error::Result;

pub use ws::WsTransport;

/// Close code for a normal, agreed shutdown.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code for an endpoint going away (server restart, page unload).
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Reserved code reported when a socket dies without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Graceful closes settle without reconnecting; everything else is abnormal.
pub fn is_graceful_close(code: u16) -> bool {
    matches!(code, CLOSE_NORMAL | CLOSE_GOING_AWAY)
}

/// What to open: url plus handshake headers.
#[derive(Clone)]
pub struct OpenRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl OpenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for OpenRequest {
    // Header values may carry credentials.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("OpenRequest")
            .field("url", &self.url)
            .field("headers", &names)
            .finish()
    }
}

/// Socket lifecycle callbacks, delivered in order on one channel per socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Handshake completed.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// Peer sent a close frame; `Closed` follows.
    Closing { code: u16, reason: String },
    /// Socket fully closed.
    Closed { code: u16, reason: String },
    /// Handshake or I/O failure; no further events follow.
    Failure(String),
}

/// Handle to one open (or opening) physical socket.
///
/// Both calls hand work to the transport and return without waiting for the
/// network.
pub trait Socket: Send + Sync {
    fn send_text(&self, frame: String) -> Result<()>;
    fn close(&self, code: u16, reason: &str);
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Start opening a socket. Must not wait for the handshake; the outcome is
    /// reported as `Opened` or `Failure` on `events`.
    async fn open(
        &self,
        request: OpenRequest,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Box<dyn Socket>>;
}
