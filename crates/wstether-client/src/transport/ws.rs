//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! Each `open` spawns one socket task that owns the stream:
//! - performs the handshake (TLS via webpki roots for `wss://`)
//! - forwards queued outbound frames in order
//! - reports inbound text frames and lifecycle changes as `SocketEvent`s
//!
//! Dropping the returned handle closes the socket with 1000.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use wstether_core::error::{Result, SendFailure, TetherError};

use crate::transport::{OpenRequest, Socket, SocketEvent, Transport, CLOSE_ABNORMAL, CLOSE_NORMAL};

/// Close code reported when the peer's close frame carried no status.
const CLOSE_NO_STATUS: u16 = 1005;

#[derive(Debug)]
enum Command {
    Text(String),
    Close { code: u16, reason: String },
}

/// Default transport for real deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(
        &self,
        request: OpenRequest,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Box<dyn Socket>> {
        let req = build_request(&request)?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(req, rx, events));
        Ok(Box::new(WsSocket { tx }))
    }
}

fn build_request(request: &OpenRequest) -> Result<Request> {
    let mut req = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| TetherError::HandshakeFailure(format!("invalid url: {e}")))?;

    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TetherError::HandshakeFailure(format!("invalid header name: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TetherError::HandshakeFailure(format!("invalid header value: {e}")))?;
        req.headers_mut().insert(name, value);
    }
    Ok(req)
}

struct WsSocket {
    tx: mpsc::UnboundedSender<Command>,
}

impl Socket for WsSocket {
    fn send_text(&self, frame: String) -> Result<()> {
        self.tx
            .send(Command::Text(frame))
            .map_err(|_| SendFailure::Transport("socket writer closed".into()).into())
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(Command::Close {
            code,
            reason: reason.to_owned(),
        });
    }
}

async fn run_socket(
    request: Request,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    // ---- handshake (abandoned if the owner closes first)
    let connecting = connect_async(request);
    tokio::pin!(connecting);
    let connected = loop {
        tokio::select! {
            res = &mut connecting => break res,
            cmd = commands.recv() => match cmd {
                Some(Command::Text(_)) => debug!("dropping frame queued before handshake"),
                Some(Command::Close { .. }) | None => return,
            }
        }
    };
    let socket = match connected {
        Ok((socket, _response)) => socket,
        Err(e) => {
            let _ = events.send(SocketEvent::Failure(format!("handshake: {e}")));
            return;
        }
    };
    if events.send(SocketEvent::Opened).is_err() {
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // outbound writer
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Text(frame)) => {
                        if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                            let _ = events.send(SocketEvent::Failure(format!("write: {e}")));
                            return;
                        }
                    }
                    Some(Command::Close { code, reason }) => {
                        let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                        let _ = ws_tx.send(Message::Close(Some(frame))).await;
                        let _ = ws_tx.close().await;
                        return;
                    }
                    None => {
                        let frame = CloseFrame { code: CloseCode::from(CLOSE_NORMAL), reason: String::from("socket handle dropped").into() };
                        let _ = ws_tx.send(Message::Close(Some(frame))).await;
                        return;
                    }
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(SocketEvent::Message(text.as_str().to_owned())).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((CLOSE_NO_STATUS, String::new()));
                        let _ = events.send(SocketEvent::Closing { code, reason: reason.clone() });
                        // flush the close reply tungstenite queued
                        let _ = ws_tx.close().await;
                        let _ = events.send(SocketEvent::Closed { code, reason });
                        return;
                    }
                    Some(Ok(Message::Binary(b))) => debug!(len = b.len(), "ignoring binary frame"),
                    // ping/pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = events.send(SocketEvent::Failure(format!("read: {e}")));
                        return;
                    }
                    None => {
                        let _ = events.send(SocketEvent::Closed {
                            code: CLOSE_ABNORMAL,
                            reason: "stream ended without close frame".into(),
                        });
                        return;
                    }
                }
            }
        }
    }
}
