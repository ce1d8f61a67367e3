use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use tracing::debug;

/// Bounded FIFO of recently seen event ids plus a membership set.
///
/// The platform redelivers events on timeout, so the same `event_id` can
/// arrive more than once. When the FIFO wraps, the set is rebuilt from the
/// surviving entries to keep memory bounded.
pub(crate) struct DedupSet {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl DedupSet {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: VecDeque::with_capacity(capacity.min(1024)),
                seen: HashSet::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` when the id was already present. New ids are recorded.
    pub(crate) fn check_and_insert(&self, event_id: &str) -> bool {
        if event_id.is_empty() {
            return false;
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.seen.contains(event_id) {
            debug!(event_id, "skip duplicated event");
            return true;
        }
        inner.order.push_back(event_id.to_string());
        inner.seen.insert(event_id.to_string());
        if inner.order.len() > self.capacity {
            inner.order.pop_front();
            // Rebuild rather than remove one-by-one: ids can in principle
            // repeat in the deque and the set must match exactly.
            let rebuilt: HashSet<String> = inner.order.iter().cloned().collect();
            debug!(len = rebuilt.len(), "dedup FIFO wrapped, membership set rebuilt");
            inner.seen = rebuilt;
        }
        false
    }
}
