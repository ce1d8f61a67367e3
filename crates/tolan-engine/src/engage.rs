//! Proactive-reply heuristics: the deterministic engage score and the
//! "be quiet" phrase check.

use tracing::debug;

use tolan_core::constants::{
    ENGAGE_KEYWORDS, PROMPT_TEMPLATE_PROACTIVE, TEMPERATURE_PROACTIVE, ZIP_KEYWORDS,
};

use crate::engine::Engine;
use crate::persona;

/// Keyword/punctuation tally clamped to [0, 1]. Each matching keyword adds
/// 0.2, a question mark adds another 0.2 on top.
pub(crate) fn basic_engage_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let mut score = 0.0;
    for keyword in ENGAGE_KEYWORDS {
        if text.contains(keyword) || lower.contains(keyword) {
            score += 0.2;
        }
    }
    if text.contains('?') || text.contains('？') {
        score += 0.2;
    }
    let clamped = f64::min(score, 1.0);
    debug!(
        preview = %text.chars().take(50).collect::<String>(),
        score = clamped,
        "engage score"
    );
    clamped
}

/// The user told the bot to be quiet.
pub(crate) fn should_zip_reply(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    ZIP_KEYWORDS.iter().any(|k| trimmed.contains(k))
}

impl Engine {
    /// Emit a short proactive reply when the engage score clears the chat's
    /// threshold. No images, no web enrichment. A failed model call is
    /// logged and dropped — this path is bot-initiated, so no error message
    /// lands in the chat.
    pub(crate) async fn maybe_proactive_engage(
        &self,
        chat_id: &str,
        text: &str,
        context: &str,
        threshold: f64,
    ) {
        let score = basic_engage_score(text);
        if score < threshold {
            debug!(chat_id, score, threshold, "proactive engage skipped");
            return;
        }
        debug!(chat_id, score, threshold, "proactive engage triggered");

        let settings = self.settings_for(chat_id);
        let prompt = PROMPT_TEMPLATE_PROACTIVE
            .replace("{context}", context)
            .replace("{text}", text);
        match self
            .llm
            .chat(&prompt, &persona::proactive_system_prompt(&settings), TEMPERATURE_PROACTIVE)
            .await
        {
            Ok(reply) => self.chat.send_text(chat_id, &reply).await,
            Err(e) => crate::answer::log_llm_failure(chat_id, &e, "proactive reply"),
        }
    }
}
