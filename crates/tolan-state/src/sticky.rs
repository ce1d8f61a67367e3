use std::collections::HashMap;
use std::sync::Mutex;

/// `chat_id → active_until` epoch seconds. The chat is sticky-active while
/// `now <= active_until`.
pub(crate) struct StickyMap {
    until: Mutex<HashMap<String, f64>>,
}

impl StickyMap {
    pub(crate) fn new() -> Self {
        Self {
            until: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn mark(&self, chat_id: &str, active_until: f64) {
        self.until
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), active_until);
    }

    pub(crate) fn is_active(&self, chat_id: &str, now: f64) -> bool {
        self.until
            .lock()
            .unwrap()
            .get(chat_id)
            .map(|deadline| now <= *deadline)
            .unwrap_or(false)
    }

    pub(crate) fn clear(&self, chat_id: &str) {
        self.until.lock().unwrap().remove(chat_id);
    }
}
