//! Scripted in-memory transport.
//!
//! Each `open` consumes the next [`Step`] (defaulting to `Accept`) and records
//! the request, the event sender and everything written to the socket, so a
//! test can drive socket lifecycle events by hand.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio::time::Instant;

use wstether_client::config::ClientSection;
use wstether_client::realtime::{ConnectionManager, ConnectionStatus, StatusObserver};
use wstether_client::transport::{OpenRequest, Socket, SocketEvent, Transport};
use wstether_core::error::{Result, TetherError};

#[derive(Debug, Clone)]
pub enum Step {
    /// Handshake succeeds immediately.
    Accept,
    /// Handshake fails with this cause.
    Reject(String),
    /// Handshake succeeds and the peer closes straight away with this code.
    AcceptThenClose(u16),
    /// Handshake never completes on its own.
    Hang,
    /// `open` itself errors.
    OpenError,
}

#[derive(Clone)]
pub struct Opened {
    pub request: OpenRequest,
    pub at: Instant,
    events: mpsc::UnboundedSender<SocketEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<Option<(u16, String)>>>,
}

impl Opened {
    pub fn emit(&self, event: SocketEvent) {
        let _ = self.events.send(event);
    }

    pub fn close_abnormally(&self) {
        self.emit(SocketEvent::Closed {
            code: 1006,
            reason: "connection reset".into(),
        });
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Option<(u16, String)> {
        self.closed.lock().unwrap().clone()
    }
}

struct MockSocket {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<Option<(u16, String)>>>,
}

impl Socket for MockSocket {
    fn send_text(&self, frame: String) -> Result<()> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        *self.closed.lock().unwrap() = Some((code, reason.to_string()));
    }
}

#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<Step>>>,
    opens: Arc<Mutex<Vec<Opened>>>,
}

impl MockTransport {
    pub fn scripted(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            opens: Arc::default(),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn socket(&self, index: usize) -> Opened {
        self.opens.lock().unwrap()[index].clone()
    }

    pub fn last(&self) -> Opened {
        self.opens.lock().unwrap().last().cloned().unwrap()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.opens.lock().unwrap().iter().map(|o| o.at).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        request: OpenRequest,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Box<dyn Socket>> {
        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Accept);
        if let Step::OpenError = step {
            return Err(TetherError::HandshakeFailure("unreachable endpoint".into()));
        }

        let opened = Opened {
            request,
            at: Instant::now(),
            events: events.clone(),
            sent: Arc::default(),
            closed: Arc::default(),
        };
        let socket = MockSocket {
            sent: opened.sent.clone(),
            closed: opened.closed.clone(),
        };
        self.opens.lock().unwrap().push(opened);

        match step {
            Step::Accept => {
                let _ = events.send(SocketEvent::Opened);
            }
            Step::AcceptThenClose(code) => {
                let _ = events.send(SocketEvent::Opened);
                let _ = events.send(SocketEvent::Closed {
                    code,
                    reason: "going away".into(),
                });
            }
            Step::Reject(cause) => {
                let _ = events.send(SocketEvent::Failure(cause));
            }
            Step::Hang | Step::OpenError => {}
        }
        Ok(Box::new(socket))
    }
}

pub const ENDPOINT: &str = "wss://chat.example.com/ws";

pub fn token() -> SecretString {
    SecretString::new("t0ken".into())
}

pub fn manager_with(cfg: ClientSection, steps: impl IntoIterator<Item = Step>) -> (ConnectionManager, MockTransport) {
    let transport = MockTransport::scripted(steps);
    let manager = ConnectionManager::new(cfg, Arc::new(transport.clone()));
    (manager, transport)
}

pub fn manager(steps: impl IntoIterator<Item = Step>) -> (ConnectionManager, MockTransport) {
    manager_with(ClientSection::default(), steps)
}

/// Let every ready task run without moving the paused clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Transitions delivered so far and not yet consumed.
pub fn drain(obs: &mut StatusObserver) -> Vec<ConnectionStatus> {
    std::iter::from_fn(|| obs.try_next()).collect()
}

pub fn is_failed(status: &ConnectionStatus) -> bool {
    matches!(status, ConnectionStatus::Failed { .. })
}
