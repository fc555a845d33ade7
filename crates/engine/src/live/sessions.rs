use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Default per-session queue bound.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

pub type SessionId = u64;

/// Registry of live subscriber sessions, each with a bounded queue.
///
/// Delivery never waits: a session whose queue is full misses that message.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Allocates a session and returns the receiving end of its queue.
    pub fn open(&self) -> (SessionId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        self.sessions.write().insert(id, tx);
        debug!(session_id = id, "Session opened");
        (id, rx)
    }

    /// Drops the session's sender, which ends its writer once drained.
    pub fn close(&self, id: SessionId) {
        if self.sessions.write().remove(&id).is_some() {
            debug!(session_id = id, "Session closed");
        } else {
            debug!(session_id = id, "Session not found");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Offers the message to every session; returns how many accepted it.
    pub fn broadcast(&self, message: &str) -> usize {
        self.deliver(message, None)
    }

    /// Offers the message to every session except `origin`.
    pub fn broadcast_except(&self, origin: SessionId, message: &str) -> usize {
        self.deliver(message, Some(origin))
    }

    fn deliver(&self, message: &str, skip: Option<SessionId>) -> usize {
        let sessions = self.sessions.read();
        let mut delivered = 0;

        for (id, tx) in sessions.iter() {
            if Some(*id) == skip {
                continue;
            }
            match tx.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(session_id = id, "Session is busy, message not sent");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(session_id = id, "Session writer is gone, message not sent");
                }
            }
        }

        delivered
    }
}
