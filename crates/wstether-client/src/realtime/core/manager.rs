//! Connection state machine.
//!
//! One [`ConnectionManager`] owns at most one physical socket. All mutations
//! of status, socket handle and membership go through a single async mutex;
//! background work (socket pump, handshake timer, heartbeat, reconnection)
//! runs in tasks that hold only a `Weak` reference and re-validate under the
//! lock before acting.
//!
//! Two counters keep stale work out:
//! - `generation` changes whenever a socket is torn down; events and timers
//!   tagged with an older generation are discarded.
//! - `epoch` changes on `disconnect` and on a manual `connect`; a reconnection
//!   task bound to an older epoch exits at its next checkpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use secrecy::SecretString;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use wstether_core::error::{Result, TetherError};
use wstether_core::protocol::{codec, Envelope};

use crate::config::ClientSection;
use crate::dispatch::{InboundDispatcher, InboundStream};
use crate::realtime::core::heartbeat;
use crate::realtime::core::membership::RoomMembership;
use crate::realtime::core::reconnect::{ReconnectPolicy, RetryState};
use crate::realtime::core::status_feed::{StatusFeed, StatusObserver};
use crate::realtime::types::{
    ConnectTarget, ConnectionStatus, REASON_ABNORMAL_CLOSE, REASON_HANDSHAKE, REASON_TIMEOUT,
    REASON_TRANSPORT,
};
use crate::transport::{is_graceful_close, Socket, SocketEvent, Transport, WsTransport, CLOSE_NORMAL};

struct ManagerState {
    status: ConnectionStatus,
    feed: StatusFeed,
    generation: u64,
    epoch: u64,
    socket: Option<Box<dyn Socket>>,
    target: Option<ConnectTarget>,
    pump: Option<JoinHandle<()>>,
    handshake_timer: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    retry: RetryState,
}

struct Shared {
    cfg: ClientSection,
    transport: Arc<dyn Transport>,
    state: Mutex<ManagerState>,
    rooms: RoomMembership,
    inbound: InboundDispatcher,
    live_generation: AtomicU64,
}

/// Long-lived connection manager. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(cfg: ClientSection, transport: Arc<dyn Transport>) -> Self {
        let retry = ReconnectPolicy::from_config(&cfg.reconnect).state();
        let inbound = InboundDispatcher::new(cfg.inbound_buffer);
        Self {
            shared: Arc::new(Shared {
                cfg,
                transport,
                state: Mutex::new(ManagerState {
                    status: ConnectionStatus::Disconnected,
                    feed: StatusFeed::new(),
                    generation: 0,
                    epoch: 0,
                    socket: None,
                    target: None,
                    pump: None,
                    handshake_timer: None,
                    heartbeat: None,
                    reconnect: None,
                    retry,
                }),
                rooms: RoomMembership::new(),
                inbound,
                live_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Manager over the bundled `tokio-tungstenite` transport.
    pub fn with_websocket(cfg: ClientSection) -> Self {
        Self::new(cfg, Arc::new(WsTransport::new()))
    }

    pub fn config(&self) -> &ClientSection {
        &self.shared.cfg
    }

    /// Open a session and wait until it is Connected or has failed.
    ///
    /// Returns immediately when already Connected. While a handshake is in
    /// flight, the call waits on that attempt instead of opening another
    /// socket (its `endpoint` and `credential` are then unused).
    pub async fn connect(&self, endpoint: impl Into<String>, credential: SecretString) -> Result<()> {
        let shared = &self.shared;
        let mut st = shared.state.lock().await;
        let mut obs = match st.status.clone() {
            ConnectionStatus::Connected => return Ok(()),
            ConnectionStatus::Connecting => {
                debug!(generation = st.generation, "joining in-flight handshake");
                st.feed.subscribe(ConnectionStatus::Connecting)
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Failed { .. } => {
                st.epoch += 1;
                if let Some(task) = st.reconnect.take() {
                    task.abort();
                }
                let target = ConnectTarget::new(endpoint, credential);
                info!(endpoint = target.endpoint(), "connecting");
                st.target = Some(target.clone());
                shared.open_socket(&mut st, &target).await?;
                let current = st.status.clone();
                st.feed.subscribe(current)
            }
        };
        drop(st);
        outcome(&mut obs).await
    }

    /// Connect to the configured endpoint.
    pub async fn connect_configured(&self, credential: SecretString) -> Result<()> {
        let endpoint = self.shared.cfg.endpoint.clone();
        self.connect(endpoint, credential).await
    }

    /// Close the session, stop heartbeat and reconnection, forget membership.
    /// No-op when already Disconnected.
    pub async fn disconnect(&self) {
        let shared = &self.shared;
        let mut st = shared.state.lock().await;
        if st.status == ConnectionStatus::Disconnected && st.socket.is_none() {
            return;
        }
        st.epoch += 1;
        if let Some(task) = st.reconnect.take() {
            task.abort();
        }
        shared.teardown(&mut st, CLOSE_NORMAL, "User disconnection");
        st.target = None;
        shared.rooms.clear();
        info!(generation = st.generation, "disconnected by user");
        shared.transition(&mut st, ConnectionStatus::Disconnected);
    }

    /// Hand one envelope to the transport. Fails with `NotConnected` unless
    /// Connected; never retried.
    pub async fn send(&self, env: &Envelope) -> Result<()> {
        let st = self.shared.state.lock().await;
        send_locked(&st, env)
    }

    /// Record the room, then send JOIN_ROOM. Membership is kept even if the
    /// send fails.
    pub async fn join_room(&self, room_id: &str) -> Result<()> {
        let st = self.shared.state.lock().await;
        if self.shared.rooms.join(room_id) {
            info!(room = room_id, "room joined");
        }
        send_locked(&st, &Envelope::join_room(room_id))
    }

    /// Forget the room, then send LEAVE_ROOM.
    pub async fn leave_room(&self, room_id: &str) -> Result<()> {
        let st = self.shared.state.lock().await;
        if self.shared.rooms.leave(room_id) {
            info!(room = room_id, "room left");
        }
        send_locked(&st, &Envelope::leave_room(room_id))
    }

    /// Re-send JOIN_ROOM for every recorded room. Returns how many were sent.
    pub async fn rejoin_rooms(&self) -> Result<usize> {
        let st = self.shared.state.lock().await;
        let replay = self.shared.rooms.replay_envelopes();
        for env in &replay {
            send_locked(&st, env)?;
        }
        info!(rooms = replay.len(), "rooms replayed");
        Ok(replay.len())
    }

    pub fn rooms(&self) -> Vec<String> {
        self.shared.rooms.snapshot()
    }

    pub fn is_member(&self, room_id: &str) -> bool {
        self.shared.rooms.contains(room_id)
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().await.status.clone()
    }

    pub async fn retry_state(&self) -> RetryState {
        self.shared.state.lock().await.retry
    }

    /// Observer starting at the current status, then every later transition.
    pub async fn subscribe_status(&self) -> StatusObserver {
        let mut st = self.shared.state.lock().await;
        let current = st.status.clone();
        st.feed.subscribe(current)
    }

    /// Decoded inbound envelopes from now on.
    pub fn subscribe_inbound(&self) -> InboundStream {
        self.shared.inbound.subscribe()
    }
}

fn send_locked(st: &ManagerState, env: &Envelope) -> Result<()> {
    if !st.status.is_connected() {
        return Err(TetherError::not_connected());
    }
    let socket = st.socket.as_ref().ok_or_else(TetherError::not_connected)?;
    let frame = codec::encode(env)?;
    socket.send_text(frame)?;
    debug!(kind = %env.kind(), room = env.room_id().unwrap_or(""), "frame sent");
    Ok(())
}

/// Map the first non-Connecting status into the result of `connect`.
async fn outcome(obs: &mut StatusObserver) -> Result<()> {
    match obs.wait_for(|s| !s.is_connecting()).await {
        Some(ConnectionStatus::Connected) => Ok(()),
        Some(ConnectionStatus::Failed { reason, .. }) if reason == REASON_TIMEOUT => {
            Err(TetherError::HandshakeTimeout)
        }
        Some(ConnectionStatus::Failed { reason, cause }) => {
            Err(TetherError::HandshakeFailure(cause.unwrap_or(reason)))
        }
        Some(ConnectionStatus::Disconnected) => Err(TetherError::HandshakeFailure(
            "disconnected before handshake completed".into(),
        )),
        Some(ConnectionStatus::Connecting) | None => {
            Err(TetherError::Internal("status feed closed".into()))
        }
    }
}

impl Shared {
    /// Publish a status change and start or stop the status-bound tasks.
    fn transition(self: &Arc<Self>, st: &mut ManagerState, next: ConnectionStatus) {
        if st.status == next {
            return;
        }
        let prev = std::mem::replace(&mut st.status, next.clone());
        info!(
            from = prev.label(),
            to = next.label(),
            generation = st.generation,
            status = %next,
            "connection status"
        );

        if let Some(task) = st.heartbeat.take() {
            task.abort();
        }
        match &next {
            ConnectionStatus::Connected => {
                if let Some(task) = st.handshake_timer.take() {
                    task.abort();
                }
                st.retry.reset();
                st.heartbeat = Some(self.spawn_heartbeat(st.generation));
                let rooms = self.rooms.snapshot();
                info!(count = rooms.len(), rooms = ?rooms, "membership available for replay");
            }
            ConnectionStatus::Connecting => {}
            ConnectionStatus::Disconnected | ConnectionStatus::Failed { .. } => {
                if let Some(task) = st.handshake_timer.take() {
                    task.abort();
                }
            }
        }

        st.feed.publish(&next);
    }

    /// Close the current socket (if any) and invalidate everything tagged
    /// with its generation.
    fn teardown(&self, st: &mut ManagerState, code: u16, reason: &str) {
        if let Some(socket) = st.socket.take() {
            debug!(generation = st.generation, code, reason, "closing socket");
            socket.close(code, reason);
        }
        if let Some(task) = st.pump.take() {
            task.abort();
        }
        if let Some(task) = st.handshake_timer.take() {
            task.abort();
        }
        self.bump_generation(st);
    }

    /// Forget a socket that already went down. Called from its own pump.
    fn retire(&self, st: &mut ManagerState) {
        st.socket = None;
        st.pump = None;
        self.bump_generation(st);
    }

    fn bump_generation(&self, st: &mut ManagerState) {
        st.generation += 1;
        self.live_generation.store(st.generation, Ordering::Release);
    }

    /// Replace any socket with a fresh one for `target` and enter Connecting.
    async fn open_socket(self: &Arc<Self>, st: &mut ManagerState, target: &ConnectTarget) -> Result<()> {
        self.teardown(st, CLOSE_NORMAL, "reconnecting");
        let generation = st.generation;
        self.transition(st, ConnectionStatus::Connecting);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        match self.transport.open(target.open_request(), events_tx).await {
            Ok(socket) => {
                st.socket = Some(socket);
                st.pump = Some(self.spawn_pump(generation, events_rx));
                st.handshake_timer = Some(self.spawn_handshake_timer(generation));
                debug!(generation, "socket opening");
                Ok(())
            }
            Err(e) => {
                warn!(generation, error.code = e.code().as_str(), error = %e, "socket open failed");
                self.transition(st, ConnectionStatus::failed(REASON_HANDSHAKE, Some(e.to_string())));
                Err(e)
            }
        }
    }

    fn spawn_pump(
        self: &Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<SocketEvent>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if !shared.on_socket_event(generation, event).await {
                    break;
                }
            }
        })
    }

    fn spawn_handshake_timer(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let timeout = self.cfg.handshake_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = weak.upgrade() {
                shared.on_handshake_timeout(generation).await;
            }
        })
    }

    fn spawn_heartbeat(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        heartbeat::spawn(self.cfg.heartbeat_interval(), move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(shared) => shared.beat(generation).await,
                    None => false,
                }
            }
        })
    }

    fn spawn_reconnect(self: &Arc<Self>, st: &mut ManagerState) {
        if !self.cfg.reconnect.enabled {
            info!("reconnect disabled");
            st.target = None;
            self.transition(st, ConnectionStatus::Disconnected);
            return;
        }
        if let Some(task) = st.reconnect.take() {
            task.abort();
        }
        let weak = Arc::downgrade(self);
        st.reconnect = Some(tokio::spawn(reconnect_loop(weak, st.epoch)));
    }

    /// Returns false once this socket's pump should stop.
    async fn on_socket_event(self: &Arc<Self>, generation: u64, event: SocketEvent) -> bool {
        if let SocketEvent::Message(text) = &event {
            if self.live_generation.load(Ordering::Acquire) != generation {
                debug!(generation, "discarding frame from retired socket");
                return false;
            }
            self.inbound.publish_frame(text);
            return true;
        }

        let mut st = self.state.lock().await;
        if st.generation != generation {
            debug!(generation, current = st.generation, "discarding stale socket event");
            return false;
        }

        match event {
            SocketEvent::Opened => {
                if st.status.is_connecting() {
                    self.transition(&mut st, ConnectionStatus::Connected);
                }
                true
            }
            SocketEvent::Closing { code, reason } => {
                debug!(generation, code, reason = %reason, "peer is closing");
                true
            }
            SocketEvent::Closed { code, reason } => {
                self.on_socket_down(&mut st, Some(code), reason);
                false
            }
            SocketEvent::Failure(cause) => {
                self.on_socket_down(&mut st, None, cause);
                false
            }
            SocketEvent::Message(_) => true,
        }
    }

    fn on_socket_down(self: &Arc<Self>, st: &mut ManagerState, code: Option<u16>, detail: String) {
        let generation = st.generation;
        self.retire(st);

        match st.status.clone() {
            ConnectionStatus::Connected => match code {
                Some(code) if is_graceful_close(code) => {
                    info!(generation, code, "server closed the connection");
                    st.target = None;
                    self.transition(st, ConnectionStatus::Disconnected);
                }
                Some(code) => {
                    let cause = TetherError::AbnormalClose {
                        code,
                        reason: detail,
                    };
                    warn!(generation, code, error.code = cause.code().as_str(), "connection lost");
                    self.transition(
                        st,
                        ConnectionStatus::failed(REASON_ABNORMAL_CLOSE, Some(cause.to_string())),
                    );
                    self.spawn_reconnect(st);
                }
                None => {
                    warn!(generation, error = %detail, "connection failed");
                    self.transition(st, ConnectionStatus::failed(REASON_TRANSPORT, Some(detail)));
                    self.spawn_reconnect(st);
                }
            },
            ConnectionStatus::Connecting => {
                warn!(generation, code = ?code, error = %detail, "handshake failed");
                self.transition(st, ConnectionStatus::failed(REASON_HANDSHAKE, Some(detail)));
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Failed { .. } => {
                debug!(generation, "socket down after terminal state");
            }
        }
    }

    async fn on_handshake_timeout(self: &Arc<Self>, generation: u64) {
        let mut st = self.state.lock().await;
        if st.generation != generation || !st.status.is_connecting() {
            return;
        }
        // this task; let it finish on its own
        st.handshake_timer = None;
        warn!(
            generation,
            timeout_ms = self.cfg.handshake_timeout_ms,
            error.code = TetherError::HandshakeTimeout.code().as_str(),
            "handshake timed out"
        );
        self.teardown(&mut st, CLOSE_NORMAL, "handshake timeout");
        self.transition(&mut st, ConnectionStatus::failed(REASON_TIMEOUT, None));
    }

    async fn beat(&self, generation: u64) -> bool {
        let st = self.state.lock().await;
        if st.generation != generation || !st.status.is_connected() {
            return false;
        }
        if let Err(e) = send_locked(&st, &Envelope::heartbeat()) {
            warn!(generation, error.code = e.code().as_str(), error = %e, "heartbeat not sent");
        }
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let st = self.state.get_mut();
        for task in [
            st.pump.take(),
            st.handshake_timer.take(),
            st.heartbeat.take(),
            st.reconnect.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        if let Some(socket) = st.socket.take() {
            socket.close(CLOSE_NORMAL, "client dropped");
        }
    }
}

/// Walk the backoff schedule for one epoch.
///
/// With `reopen` each step re-opens a socket for the remembered target;
/// without it the schedule only gives the application time to reconnect.
/// Either way an exhausted budget settles to Disconnected.
async fn reconnect_loop(weak: Weak<Shared>, epoch: u64) {
    loop {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let mut st = shared.state.lock().await;
        if st.epoch != epoch || st.status.is_connected() {
            return;
        }
        let Some(delay) = st.retry.next_delay() else {
            warn!(attempts = st.retry.attempt(), "reconnect attempts exhausted");
            st.reconnect = None;
            st.target = None;
            shared.transition(&mut st, ConnectionStatus::Disconnected);
            return;
        };
        info!(
            attempt = st.retry.attempt(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnect scheduled"
        );
        drop(st);
        drop(shared);

        tokio::time::sleep(delay).await;

        let Some(shared) = weak.upgrade() else {
            return;
        };
        let mut st = shared.state.lock().await;
        if st.epoch != epoch {
            return;
        }
        if st.status.is_connected() {
            debug!("connected independently; reconnect stopped");
            return;
        }
        if !shared.cfg.reconnect.reopen {
            continue;
        }
        let Some(target) = st.target.clone() else {
            continue;
        };
        info!(attempt = st.retry.attempt(), endpoint = target.endpoint(), "reconnecting");
        if shared.open_socket(&mut st, &target).await.is_err() {
            continue;
        }
        let current = st.status.clone();
        let mut obs = st.feed.subscribe(current);
        drop(st);
        drop(shared);

        match obs.wait_for(|s| !s.is_connecting()).await {
            Some(ConnectionStatus::Connected) => return,
            Some(status) => debug!(status = %status, "reconnect attempt did not connect"),
            None => return,
        }
    }
}
