//! Recent peer output kept for clients that connect later.

use std::collections::BTreeSet;

use crate::constants::PEER_LOG_CAPACITY;
use crate::peer::{ClientId, ReplySink};

/// Byte-bounded log; when full the oldest output is dropped.
pub struct PeerLog {
    log: String,
    capacity: usize,
    subscribers: BTreeSet<ClientId>,
}

impl PeerLog {
    pub fn new(capacity: usize) -> Self {
        PeerLog {
            log: String::with_capacity(capacity),
            capacity,
            subscribers: BTreeSet::new(),
        }
    }

    /// Append one line of peer output and forward it to subscribers
    pub fn push_line(&mut self, line: &str, replies: &mut dyn ReplySink) {
        self.log.push_str(line);
        self.log.push('\n');
        self.shrink();

        for &client in &self.subscribers {
            replies.deliver(client, line);
        }
    }

    pub fn contents(&self) -> &str {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }

    pub fn subscribe(&mut self, client: ClientId) {
        self.subscribers.insert(client);
    }

    pub fn unsubscribe(&mut self, client: ClientId) {
        self.subscribers.remove(&client);
    }

    /// Drop from the front until the log fits. Lines are ASCII, so any
    /// byte offset is a char boundary.
    fn shrink(&mut self) {
        if self.log.len() > self.capacity {
            let excess = self.log.len() - self.capacity;
            self.log.drain(..excess);
        }
    }
}

impl Default for PeerLog {
    fn default() -> Self {
        Self::new(PEER_LOG_CAPACITY)
    }
}
