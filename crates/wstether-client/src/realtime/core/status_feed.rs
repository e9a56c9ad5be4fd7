use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::realtime::types::ConnectionStatus;

/// Observer registry for status transitions.
///
/// Owned by the connection manager and only touched under its lock, so every
/// observer sees the same transitions in the same order.
#[derive(Default)]
pub struct StatusFeed {
    observers: Vec<mpsc::UnboundedSender<ConnectionStatus>>,
}

impl StatusFeed {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Register an observer whose `current()` starts at `current`.
    pub fn subscribe(&mut self, current: ConnectionStatus) -> StatusObserver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        StatusObserver { current, rx }
    }

    /// Deliver one transition to every live observer; dropped observers are pruned.
    pub fn publish(&mut self, status: &ConnectionStatus) {
        self.observers.retain(|tx| tx.send(status.clone()).is_ok());
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

/// One subscriber's view of the status stream.
pub struct StatusObserver {
    current: ConnectionStatus,
    rx: mpsc::UnboundedReceiver<ConnectionStatus>,
}

impl StatusObserver {
    /// Latest status this observer has seen.
    pub fn current(&self) -> &ConnectionStatus {
        &self.current
    }

    /// Next transition, or `None` once the manager is gone.
    pub async fn next(&mut self) -> Option<ConnectionStatus> {
        let status = self.rx.recv().await?;
        self.current = status.clone();
        Some(status)
    }

    /// Transition already delivered but not yet consumed, if any.
    pub fn try_next(&mut self) -> Option<ConnectionStatus> {
        let status = self.rx.try_recv().ok()?;
        self.current = status.clone();
        Some(status)
    }

    /// Resolve with the first status (current included) matching `pred`.
    pub async fn wait_for<F>(&mut self, mut pred: F) -> Option<ConnectionStatus>
    where
        F: FnMut(&ConnectionStatus) -> bool,
    {
        if pred(&self.current) {
            return Some(self.current.clone());
        }
        while let Some(status) = self.next().await {
            if pred(&status) {
                return Some(status);
            }
        }
        None
    }

    /// Transitions as a `Stream`, starting after `current()`.
    pub fn into_stream(self) -> impl Stream<Item = ConnectionStatus> + Send + 'static {
        stream::unfold(self, |mut obs| async move {
            let status = obs.next().await?;
            Some((status, obs))
        })
    }
}
