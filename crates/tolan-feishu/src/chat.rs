//! The five-operation chat surface the engine depends on.
//!
//! Delivery methods are best-effort by contract: failures are logged by the
//! implementation, never raised, so a dead chat API can't take down an event
//! task. Fetch methods degrade to empty values.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send plain text. At-least-once; errors logged, not raised.
    async fn send_text(&self, chat_id: &str, text: &str);

    /// Upload an image blob, returning the platform's opaque image key.
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String>;

    /// Send a previously uploaded image, with an optional caption.
    async fn send_image(&self, chat_id: &str, image_key: &str, caption: &str);

    /// Text of a message by id, for quote expansion. Empty on failure.
    async fn get_message_text(&self, message_id: &str) -> String;

    /// Media bytes + MIME from a message. Both ids must be non-empty.
    async fn get_message_media(&self, message_id: &str, key: &str) -> Option<(Vec<u8>, String)>;
}
