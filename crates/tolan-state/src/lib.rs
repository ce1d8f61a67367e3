//! Process-lifetime mutable state: event dedup, per-chat recent-message
//! rings, and conversation-active windows.
//!
//! Nothing here survives a restart; the persistent counterpart lives in
//! `tolan-store`. Each map has its own mutex — the dedup FIFO is touched
//! only on the intake path, the ring and sticky map from event tasks.

mod dedup;
mod ring;
mod sticky;

use std::sync::Arc;

use tolan_core::clock::Clock;
use tolan_core::types::RecentMessage;

use dedup::DedupSet;
use ring::RingMap;
use sticky::StickyMap;

/// All in-memory state, owned by the engine and shared behind `Arc`.
pub struct StateStore {
    clock: Arc<dyn Clock>,
    dedup: DedupSet,
    rings: RingMap,
    sticky: StickyMap,
    conversation_ttl: f64,
}

impl StateStore {
    pub fn new(
        clock: Arc<dyn Clock>,
        dedup_capacity: usize,
        ring_capacity: usize,
        conversation_ttl_seconds: u64,
    ) -> Self {
        Self {
            clock,
            dedup: DedupSet::new(dedup_capacity),
            rings: RingMap::new(ring_capacity),
            sticky: StickyMap::new(),
            conversation_ttl: conversation_ttl_seconds as f64,
        }
    }

    /// Returns `true` when `event_id` was already seen; otherwise records it.
    /// Empty ids are never deduplicated.
    pub fn seen_event(&self, event_id: &str) -> bool {
        self.dedup.check_and_insert(event_id)
    }

    /// Append one message to the chat's ring, evicting the oldest on overflow.
    pub fn push_message(&self, chat_id: &str, message: RecentMessage) {
        self.rings.push(chat_id, message);
    }

    /// Up to `limit` most recent messages, oldest first.
    pub fn recent_messages(&self, chat_id: &str, limit: usize) -> Vec<RecentMessage> {
        self.rings.tail(chat_id, limit)
    }

    pub fn clear_messages(&self, chat_id: &str) {
        self.rings.clear(chat_id);
    }

    /// Extend the chat's sticky-conversation window by the configured TTL.
    pub fn mark_conversation_active(&self, chat_id: &str) {
        if chat_id.is_empty() {
            return;
        }
        self.sticky
            .mark(chat_id, self.clock.now() + self.conversation_ttl);
    }

    pub fn is_conversation_active(&self, chat_id: &str) -> bool {
        if chat_id.is_empty() {
            return false;
        }
        self.sticky.is_active(chat_id, self.clock.now())
    }

    pub fn clear_conversation(&self, chat_id: &str) {
        self.sticky.clear(chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Test clock advanced by hand, in whole seconds.
    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn new() -> Self {
            Self(AtomicU64::new(1_000_000))
        }
        fn advance(&self, secs: u64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> f64 {
            self.0.load(Ordering::SeqCst) as f64
        }
    }

    fn msg(text: &str) -> RecentMessage {
        RecentMessage {
            ts: "01-01 00:00".into(),
            user_id: "ou_user".into(),
            text: text.into(),
        }
    }

    #[test]
    fn duplicate_event_id_is_reported_once() {
        let store = StateStore::new(Arc::new(ManualClock::new()), 100, 10, 600);
        assert!(!store.seen_event("E1"));
        assert!(store.seen_event("E1"));
        assert!(!store.seen_event("E2"));
    }

    #[test]
    fn empty_event_id_never_dedups() {
        let store = StateStore::new(Arc::new(ManualClock::new()), 100, 10, 600);
        assert!(!store.seen_event(""));
        assert!(!store.seen_event(""));
    }

    #[test]
    fn dedup_set_survives_fifo_rotation() {
        let store = StateStore::new(Arc::new(ManualClock::new()), 4, 10, 600);
        for i in 0..10 {
            assert!(!store.seen_event(&format!("E{i}")), "E{i} seen twice");
        }
        // The most recent id is still known after many rotations.
        assert!(store.seen_event("E9"));
        // An evicted id is forgotten — it dedups as new again.
        assert!(!store.seen_event("E0"));
    }

    #[test]
    fn ring_never_exceeds_capacity_and_drops_oldest() {
        let store = StateStore::new(Arc::new(ManualClock::new()), 100, 3, 600);
        for i in 0..5 {
            store.push_message("oc_chat", msg(&format!("m{i}")));
        }
        let tail = store.recent_messages("oc_chat", 10);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].text, "m2");
        assert_eq!(tail[2].text, "m4");
    }

    #[test]
    fn recent_messages_limit_takes_the_newest() {
        let store = StateStore::new(Arc::new(ManualClock::new()), 100, 10, 600);
        for i in 0..6 {
            store.push_message("oc_chat", msg(&format!("m{i}")));
        }
        let tail = store.recent_messages("oc_chat", 2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text, "m4");
        assert_eq!(tail[1].text, "m5");
    }

    #[test]
    fn sticky_window_expires_with_the_clock() {
        let clock = Arc::new(ManualClock::new());
        let store = StateStore::new(clock.clone(), 100, 10, 600);

        assert!(!store.is_conversation_active("oc_chat"));
        store.mark_conversation_active("oc_chat");
        assert!(store.is_conversation_active("oc_chat"));

        clock.advance(599);
        assert!(store.is_conversation_active("oc_chat"));
        clock.advance(2);
        assert!(!store.is_conversation_active("oc_chat"));
    }

    #[test]
    fn clear_conversation_closes_the_window() {
        let store = StateStore::new(Arc::new(ManualClock::new()), 100, 10, 600);
        store.mark_conversation_active("oc_chat");
        store.clear_conversation("oc_chat");
        assert!(!store.is_conversation_active("oc_chat"));
    }
}
