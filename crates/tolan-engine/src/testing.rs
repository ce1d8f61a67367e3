//! Test doubles shared by the engine's unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tolan_core::config::TolanConfig;
use tolan_feishu::{ChatClient, FeishuError};
use tolan_store::MessageStore;

use crate::engine::Engine;

/// Records every outbound call; fetches answer from preset tables.
#[derive(Default)]
pub(crate) struct RecordingChat {
    texts: Mutex<Vec<String>>,
    images: Mutex<Vec<(String, String)>>,
    message_texts: Mutex<HashMap<String, String>>,
    media: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl RecordingChat {
    pub(crate) async fn texts(&self) -> Vec<String> {
        self.texts.lock().await.clone()
    }

    #[allow(dead_code)]
    pub(crate) async fn images(&self) -> Vec<(String, String)> {
        self.images.lock().await.clone()
    }

    pub(crate) async fn set_message_text(&self, message_id: &str, text: &str) {
        self.message_texts
            .lock()
            .await
            .insert(message_id.to_string(), text.to_string());
    }

    #[allow(dead_code)]
    pub(crate) async fn set_media(&self, key: &str, bytes: Vec<u8>, mime: &str) {
        self.media
            .lock()
            .await
            .insert(key.to_string(), (bytes, mime.to_string()));
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn send_text(&self, _chat_id: &str, text: &str) {
        self.texts.lock().await.push(text.to_string());
    }

    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String, FeishuError> {
        Ok(format!("img_key_{}", bytes.len()))
    }

    async fn send_image(&self, _chat_id: &str, image_key: &str, caption: &str) {
        self.images
            .lock()
            .await
            .push((image_key.to_string(), caption.to_string()));
    }

    async fn get_message_text(&self, message_id: &str) -> String {
        self.message_texts
            .lock()
            .await
            .get(message_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn get_message_media(&self, _message_id: &str, key: &str) -> Option<(Vec<u8>, String)> {
        self.media.lock().await.get(key).cloned()
    }
}

/// Engine with defaults, no persistence and unconfigured models.
pub(crate) fn test_engine(chat: Arc<RecordingChat>) -> Engine {
    Engine::new(TolanConfig::default(), chat, None)
}

/// Engine with an in-memory SQLite store.
pub(crate) fn test_engine_with_store(chat: Arc<RecordingChat>) -> Engine {
    let store = MessageStore::open_in_memory().expect("in-memory store");
    Engine::new(TolanConfig::default(), chat, Some(store))
}
