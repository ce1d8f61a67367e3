//! The draw pipeline: announce, pick a reference, generate, upload, deliver.
//! Provider errors never leak into the chat — failure paths use the fixed
//! localized strings.

use tracing::{error, info};

use tolan_core::constants::{
    MSG_DRAWING, MSG_DRAW_ERROR, MSG_DRAW_NO_CONFIG, MSG_DRAW_SUCCESS, MSG_UPLOAD_FAILED,
    NO_REFERENCE_KEYWORDS,
};
use tolan_image::ImageError;
use tolan_llm::ImageAttachment;

use crate::engine::Engine;

/// An attached image is used as reference unless the text explicitly
/// declines it.
pub(crate) fn wants_reference(text: &str, has_images: bool) -> bool {
    has_images && !NO_REFERENCE_KEYWORDS.iter().any(|k| text.contains(k))
}

impl Engine {
    pub(crate) async fn handle_draw_request(
        &self,
        chat_id: &str,
        text: &str,
        user_images: &[ImageAttachment],
    ) {
        info!(
            chat_id,
            preview = %text.chars().take(80).collect::<String>(),
            has_reference = !user_images.is_empty(),
            "draw request"
        );

        // Announce immediately; generation takes a while.
        self.chat.send_text(chat_id, MSG_DRAWING).await;

        let Some(image_client) = &self.image else {
            self.chat.send_text(chat_id, MSG_DRAW_NO_CONFIG).await;
            return;
        };

        let reference = if wants_reference(text, !user_images.is_empty()) {
            let first = &user_images[0];
            info!(size = first.bytes.len(), "using first attached image as reference");
            Some(first.bytes.as_slice())
        } else {
            None
        };

        let bytes = match image_client.generate(text, reference).await {
            Ok(bytes) => bytes,
            Err(ImageError::NotConfigured) => {
                self.chat.send_text(chat_id, MSG_DRAW_NO_CONFIG).await;
                return;
            }
            Err(e) => {
                error!(chat_id, error = %e, "image generation failed");
                self.chat.send_text(chat_id, MSG_DRAW_ERROR).await;
                return;
            }
        };

        let image_key = match self.chat.upload_image(bytes).await {
            Ok(key) => key,
            Err(e) => {
                error!(chat_id, error = %e, "image upload failed");
                self.chat.send_text(chat_id, MSG_UPLOAD_FAILED).await;
                return;
            }
        };

        self.chat
            .send_image(chat_id, &image_key, MSG_DRAW_SUCCESS)
            .await;
        info!(chat_id, "draw request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attached_image_is_the_default_reference() {
        assert!(wants_reference("改成赛博朋克风格", true));
        assert!(!wants_reference("改成赛博朋克风格", false));
    }

    #[test]
    fn explicit_decline_drops_the_reference() {
        assert!(!wants_reference("不用参考这张，画只猫", true));
        assert!(!wants_reference("忽略图片，独立创作", true));
    }
}
