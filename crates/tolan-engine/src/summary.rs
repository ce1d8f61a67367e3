//! Chat summaries and new-member welcomes.

use tracing::{error, info};

use tolan_core::constants::{
    MSG_LLM_UNAVAILABLE, MSG_WELCOME_SUFFIX, PROMPT_TEMPLATE_SUMMARY, PROMPT_TEMPLATE_WELCOME,
    TEMPERATURE_SUMMARY, TEMPERATURE_WELCOME,
};
use tolan_core::types::RecentMessage;

use crate::engine::Engine;
use crate::persona;

/// Render messages as `ts-userSuffix: text` lines, newest `limit` entries.
/// User ids are clipped to their last six characters.
pub(crate) fn build_context_summary(messages: &[RecentMessage], limit: usize) -> String {
    let skip = messages.len().saturating_sub(limit);
    messages
        .iter()
        .skip(skip)
        .map(|m| {
            let suffix_start = m.user_id.len().saturating_sub(6);
            let who = &m.user_id[find_boundary(&m.user_id, suffix_start)..];
            format!("{}-{}: {}", m.ts, who, m.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn find_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

impl Engine {
    /// Generate and deliver a weekly/monthly summary for one chat.
    pub(crate) async fn summarize_chat(&self, chat_id: &str, period: &str) {
        let messages = self.context_messages(chat_id, self.config.max_summary_messages);
        if messages.is_empty() {
            info!(chat_id, period, "no messages to summarize");
            self.chat
                .send_text(chat_id, &format!("最近没有足够的消息用于{period}总结。"))
                .await;
            return;
        }

        let prompt = PROMPT_TEMPLATE_SUMMARY
            .replace("{period}", period)
            .replace("{messages}", &build_context_summary(&messages, 120));
        info!(chat_id, period, "summary model call starting");
        match self
            .llm
            .chat(&prompt, persona::summary_system_prompt(), TEMPERATURE_SUMMARY)
            .await
        {
            Ok(report) => {
                self.chat
                    .send_text(chat_id, &format!("{period}总结：\n{report}"))
                    .await;
            }
            Err(e) => {
                crate::answer::log_llm_failure(chat_id, &e, "summary");
                self.chat.send_text(chat_id, MSG_LLM_UNAVAILABLE).await;
            }
        }
    }

    /// Welcome a new member with context-aware copy. A failed model call is
    /// only logged — a welcome is not a reply, so no error lands in chat.
    pub(crate) async fn welcome_new_user(&self, chat_id: &str, name: &str) {
        info!(chat_id, name, "welcoming new member");
        let messages = self.context_messages(chat_id, 80);
        let context = build_context_summary(&messages, 40);
        let settings = self.settings_for(chat_id);

        let prompt = PROMPT_TEMPLATE_WELCOME.replace("{context}", &context);
        match self
            .llm
            .chat(
                &prompt,
                &persona::welcome_system_prompt(&settings),
                TEMPERATURE_WELCOME,
            )
            .await
        {
            Ok(text) => {
                let message = format!("欢迎 {name} 加入！\n{text}{MSG_WELCOME_SUFFIX}");
                self.chat.send_text(chat_id, &message).await;
            }
            Err(e) => error!(chat_id, error = %e, "welcome generation failed"),
        }
    }
}
