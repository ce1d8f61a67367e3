use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::debug;

use tolan_core::types::RecentMessage;

/// Per-chat bounded message rings. The in-memory context fallback when the
/// database is unavailable, and the primary store when it is disabled.
pub(crate) struct RingMap {
    rings: Mutex<HashMap<String, VecDeque<RecentMessage>>>,
    capacity: usize,
}

impl RingMap {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            rings: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn push(&self, chat_id: &str, message: RecentMessage) {
        if chat_id.is_empty() {
            return;
        }
        let mut rings = self.rings.lock().unwrap();
        let ring = rings.entry(chat_id.to_string()).or_default();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(message);
        debug!(chat_id, len = ring.len(), "appended to chat ring");
    }

    pub(crate) fn tail(&self, chat_id: &str, limit: usize) -> Vec<RecentMessage> {
        let rings = self.rings.lock().unwrap();
        match rings.get(chat_id) {
            Some(ring) => {
                let skip = ring.len().saturating_sub(limit);
                ring.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub(crate) fn clear(&self, chat_id: &str) {
        self.rings.lock().unwrap().remove(chat_id);
    }
}
