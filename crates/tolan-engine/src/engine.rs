use std::sync::Arc;

use tracing::{error, warn};

use tolan_core::clock::SystemClock;
use tolan_core::config::TolanConfig;
use tolan_core::types::{ChatSettings, RecentMessage};
use tolan_feishu::ChatClient;
use tolan_image::ImageClient;
use tolan_llm::LlmClient;
use tolan_state::StateStore;
use tolan_store::MessageStore;
use tolan_web::{SearchClient, WebFetcher};

/// Everything the decision pipeline needs, wired once at startup and shared
/// behind `Arc` across event tasks.
///
/// The engine is the error frontier: nothing escapes an event task. Remote
/// failures degrade to logged warnings and, on reply paths, a terse
/// localized message.
pub struct Engine {
    pub(crate) config: TolanConfig,
    pub(crate) state: StateStore,
    pub(crate) store: Option<MessageStore>,
    pub(crate) chat: Arc<dyn ChatClient>,
    pub(crate) llm: LlmClient,
    pub(crate) image: Option<ImageClient>,
    pub(crate) fetcher: WebFetcher,
    pub(crate) search: Option<SearchClient>,
}

impl Engine {
    pub fn new(config: TolanConfig, chat: Arc<dyn ChatClient>, store: Option<MessageStore>) -> Self {
        let state = StateStore::new(
            Arc::new(SystemClock),
            config.recent_events_maxlen,
            config.chat_logs_maxlen,
            config.conversation_ttl_seconds,
        );
        let llm = LlmClient::from_config(&config);
        let image = ImageClient::from_config(&config);
        let fetcher = WebFetcher::new(config.searxng_timeout.max(10));
        let search = SearchClient::new(&config.searxng_url, config.searxng_timeout);
        Self {
            config,
            state,
            store,
            chat,
            llm,
            image,
            fetcher,
            search,
        }
    }

    /// `true` when `event_id` was already dispatched. Called from intake.
    pub fn seen_event(&self, event_id: &str) -> bool {
        self.state.seen_event(event_id)
    }

    pub fn config(&self) -> &TolanConfig {
        &self.config
    }

    /// Settings for a chat, degrading to defaults when persistence is
    /// unavailable.
    pub(crate) fn settings_for(&self, chat_id: &str) -> ChatSettings {
        let default_threshold = self.config.engage_default_threshold;
        match &self.store {
            Some(store) => match store.get_or_create_settings(chat_id, default_threshold) {
                Ok(settings) => settings,
                Err(e) => {
                    error!(chat_id, error = %e, "settings read failed, using defaults");
                    ChatSettings::with_threshold(default_threshold)
                }
            },
            None => ChatSettings::with_threshold(default_threshold),
        }
    }

    /// Recent chat context: the database tail when available and non-empty,
    /// the in-memory ring otherwise.
    pub(crate) fn context_messages(&self, chat_id: &str, limit: usize) -> Vec<RecentMessage> {
        if let Some(store) = &self.store {
            match store.recent_messages(chat_id, limit) {
                Ok(messages) if !messages.is_empty() => return messages,
                Ok(_) => {}
                Err(e) => warn!(chat_id, error = %e, "message tail query failed, using ring"),
            }
        }
        self.state.recent_messages(chat_id, limit)
    }

    /// Append to the persistent log (best-effort) and the in-memory ring.
    pub(crate) fn persist_message(&self, chat_id: &str, user_id: &str, text: &str) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_message(chat_id, user_id, text) {
                error!(chat_id, error = %e, "message persist failed");
            }
        }
        self.state.push_message(
            chat_id,
            RecentMessage {
                ts: tolan_core::clock::display_timestamp(),
                user_id: user_id.to_string(),
                text: text.to_string(),
            },
        );
    }
}
