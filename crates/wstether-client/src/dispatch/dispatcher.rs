use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use dashmap::DashMap;
use futures_util::stream::{self, Stream};
use tokio::sync::Notify;
use tracing::{debug, warn};

use wstether_core::protocol::{codec, Envelope};

/// One subscriber's bounded buffer.
struct Queue {
    capacity: usize,
    buf: Mutex<VecDeque<Envelope>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buf: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn push(&self, env: Envelope) {
        {
            let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
            if buf.len() >= self.capacity {
                buf.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            buf.push_back(env);
        }
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Envelope> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// Fan-out of decoded inbound envelopes.
///
/// Publishing never waits: when a subscriber's buffer is full the oldest
/// envelope is discarded to make room.
pub struct InboundDispatcher {
    capacity: usize,
    subscribers: DashMap<u64, Weak<Queue>>,
    next_id: AtomicU64,
}

impl InboundDispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// New subscriber; sees envelopes published after this call.
    pub fn subscribe(&self) -> InboundStream {
        let queue = Arc::new(Queue::new(self.capacity));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, Arc::downgrade(&queue));
        InboundStream { queue }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|e| e.value().strong_count() > 0).count()
    }

    /// Decode one text frame and publish it. Malformed frames are logged and
    /// dropped; returns whether anything was published.
    pub fn publish_frame(&self, frame: &str) -> bool {
        match codec::decode(frame) {
            Ok(env) => {
                debug!(kind = %env.kind(), room = env.room_id().unwrap_or(""), "inbound envelope");
                self.publish(env);
                true
            }
            Err(e) => {
                warn!(error.code = e.code().as_str(), error = %e, len = frame.len(), "dropping undecodable frame");
                false
            }
        }
    }

    pub fn publish(&self, env: Envelope) {
        self.subscribers.retain(|_, weak| match weak.upgrade() {
            Some(queue) => {
                queue.push(env.clone());
                true
            }
            None => false,
        });
    }
}

impl Drop for InboundDispatcher {
    fn drop(&mut self) {
        for entry in self.subscribers.iter() {
            if let Some(queue) = entry.value().upgrade() {
                queue.close();
            }
        }
    }
}

/// Receiving end of one subscription.
pub struct InboundStream {
    queue: Arc<Queue>,
}

impl InboundStream {
    /// Next envelope in arrival order; `None` once the dispatcher is gone and
    /// the buffer is drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            if let Some(env) = self.queue.pop() {
                return Some(env);
            }
            if self.queue.closed.load(Ordering::Acquire) {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Buffered envelope, if one is ready.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.queue.pop()
    }

    /// Envelopes discarded by drop-oldest overflow so far.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }

    pub fn into_stream(self) -> impl Stream<Item = Envelope> + Send + 'static {
        stream::unfold(self, |mut s| async move {
            let env = s.recv().await?;
            Some((env, s))
        })
    }

    /// Only envelopes addressed to `room_id`.
    pub fn for_room(self, room_id: impl Into<String>) -> impl Stream<Item = Envelope> + Send + 'static {
        let room_id = room_id.into();
        stream::unfold((self, room_id), |(mut s, room_id)| async move {
            loop {
                let env = s.recv().await?;
                if env.room_id() == Some(room_id.as_str()) {
                    return Some((env, (s, room_id)));
                }
            }
        })
    }
}
