//! The decision tree that binds everything: sender/empty gates, persist,
//! command routing, mention handling, the sticky window, and proactive mode.

use serde_json::Value;
use tracing::{debug, info};

use tolan_core::types::{ChatMode, MessageEvent, SenderKind};
use tolan_feishu::content::extract_message_event;
use tolan_feishu::event::{extract_member_join, is_member_join, EVENT_TYPE_MESSAGE};
use tolan_feishu::mention::{mentioned_bot, mentions_someone_else};

use crate::commands::parse_command;
use crate::engage::should_zip_reply;
use crate::engine::Engine;
use crate::summary::build_context_summary;

impl Engine {
    /// Entry point for a deduplicated event. Runs inside a background task;
    /// any failure is handled here and never reaches intake.
    pub async fn handle_event(&self, event_type: &str, event_id: &str, payload: Value) {
        debug!(event_type, event_id, "dispatching event");
        if event_type == EVENT_TYPE_MESSAGE {
            let event = extract_message_event(&payload);
            self.handle_message(event).await;
        } else if is_member_join(event_type) {
            if let Some((chat_id, name)) = extract_member_join(&payload) {
                self.welcome_new_user(&chat_id, &name).await;
            } else {
                debug!(event_type, "member-join event without chat or members");
            }
        }
        // Anything else succeeds silently.
    }

    pub(crate) async fn handle_message(&self, event: MessageEvent) {
        // 1. Sender gate: only human users, never the bot itself.
        if let Some(kind) = event.sender_kind {
            if kind != SenderKind::User {
                debug!(sender_kind = ?kind, "ignoring non-user sender");
                return;
            }
        }
        if !self.config.bot_user_id.is_empty() && event.sender_id == self.config.bot_user_id {
            debug!("ignoring message from the bot itself");
            return;
        }

        // 2. Empty gate.
        if event.chat_id.is_empty() || (event.text.trim().is_empty() && event.image_keys.is_empty())
        {
            debug!("message missing chat_id or content, ignoring");
            return;
        }

        // 3. Persist, with a readable placeholder so image-only messages
        //    keep their place in summaries.
        let mut text_for_store = event.text.trim().to_string();
        if !event.image_keys.is_empty() {
            let suffix = format!("[图片x{}]", event.image_keys.len());
            if text_for_store.is_empty() {
                text_for_store = suffix;
            } else {
                text_for_store = format!("{text_for_store} {suffix}");
            }
        }
        self.persist_message(&event.chat_id, &event.sender_id, &text_for_store);

        // 4. Commands.
        if let Some(command) = parse_command(&event.text) {
            self.handle_command(&event.chat_id, &event.sender_id, command)
                .await;
            return;
        }

        // 5. Addressed by mention: answer, and open the sticky window.
        let bot_app_id = &self.config.feishu_app_id;
        let bot_name = &self.config.bot_name;
        if mentioned_bot(&event, bot_app_id, bot_name) {
            info!(
                chat_id = %event.chat_id,
                preview = %event.text.chars().take(80).collect::<String>(),
                "mentioned, answering"
            );
            self.state.mark_conversation_active(&event.chat_id);
            if let Some(store) = &self.store {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs_f64();
                let _ = store.set_last_mention_time(&event.chat_id, now);
            }
            self.answer_addressed(&event, &text_for_store).await;
            return;
        }

        // 6. Sticky window: group chat, window open, no one else addressed.
        let in_sticky_conversation = event.is_group()
            && self.state.is_conversation_active(&event.chat_id)
            && !mentions_someone_else(&event, bot_app_id, bot_name);
        if in_sticky_conversation {
            info!(chat_id = %event.chat_id, "sticky conversation, answering");
            if should_zip_reply(&event.text) {
                self.chat
                    .send_text(&event.chat_id, tolan_core::constants::MSG_ZIP_REPLY)
                    .await;
                self.state.mark_conversation_active(&event.chat_id);
                return;
            }
            self.answer_addressed(&event, &text_for_store).await;
            return;
        }

        // 7. Proactive mode: quiet suppresses, otherwise score vs threshold.
        let settings = self.settings_for(&event.chat_id);
        if settings.mode == ChatMode::Quiet {
            debug!(chat_id = %event.chat_id, "quiet mode, skipping proactive");
            return;
        }
        debug!(
            chat_id = %event.chat_id,
            mode = settings.mode.as_str(),
            threshold = settings.threshold,
            "proactive check"
        );
        let messages = self.context_messages(&event.chat_id, 12);
        let context = build_context_summary(&messages, 12);
        self.maybe_proactive_engage(&event.chat_id, &event.text, &context, settings.threshold)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_engine, test_engine_with_store, RecordingChat};
    use std::sync::Arc;
    use tolan_core::constants::{
        HELP_TEXT, MSG_DRAWING, MSG_DRAW_NO_CONFIG, MSG_LLM_UNAVAILABLE, MSG_RESET_DONE,
        MSG_ZIP_REPLY,
    };
    use tolan_core::types::{ChatType, Mention};

    fn group_message(chat_id: &str, text: &str) -> MessageEvent {
        MessageEvent {
            chat_id: chat_id.into(),
            chat_type: Some(ChatType::Group),
            sender_id: "ou_user".into(),
            sender_kind: Some(SenderKind::User),
            message_id: "om_1".into(),
            text: text.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn non_user_senders_are_dropped() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        let mut event = group_message("oc_1", "hello");
        event.sender_kind = Some(SenderKind::App);
        engine.handle_message(event).await;
        assert!(chat.texts().await.is_empty());
        assert!(engine.state.recent_messages("oc_1", 10).is_empty());
    }

    #[tokio::test]
    async fn bot_own_messages_are_dropped() {
        let chat = Arc::new(RecordingChat::default());
        let mut engine = test_engine(chat.clone());
        engine.config.bot_user_id = "ou_bot".into();
        let mut event = group_message("oc_1", "echo");
        event.sender_id = "ou_bot".into();
        engine.handle_message(event).await;
        assert!(chat.texts().await.is_empty());
    }

    #[tokio::test]
    async fn empty_messages_are_dropped() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        engine.handle_message(group_message("oc_1", "   ")).await;
        engine.handle_message(group_message("", "text")).await;
        assert!(chat.texts().await.is_empty());
        assert!(engine.state.recent_messages("oc_1", 10).is_empty());
    }

    #[tokio::test]
    async fn image_placeholder_suffix_is_stored() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        let mut event = group_message("oc_1", "看这个");
        event.image_keys = vec!["img_1".into(), "img_2".into()];
        // Media fetch returns nothing in the test double, so the answer
        // pipeline runs image-less; we only care about the stored text.
        engine.handle_message(event).await;
        let stored = engine.state.recent_messages("oc_1", 10);
        assert_eq!(stored[0].text, "看这个 [图片x2]");
    }

    #[tokio::test]
    async fn help_command_replies_with_help_text() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        engine.handle_message(group_message("oc_1", "/help")).await;
        assert_eq!(chat.texts().await, vec![HELP_TEXT.to_string()]);
    }

    #[tokio::test]
    async fn mention_answers_and_opens_sticky_window() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        let mut event = group_message("oc_1", "@群助手 帮帮我");
        event.mentions = vec![Mention {
            app_id: None,
            name: Some("群助手".into()),
        }];
        engine.handle_message(event).await;
        // The test LLM is unconfigured, so the reply path degrades to the
        // terse failure message — but the pipeline ran and the window opened.
        assert_eq!(chat.texts().await, vec![MSG_LLM_UNAVAILABLE.to_string()]);
        assert!(engine.state.is_conversation_active("oc_1"));
    }

    #[tokio::test]
    async fn zip_phrase_in_sticky_window_mutes_without_model_call() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        engine.state.mark_conversation_active("oc_1");
        engine.handle_message(group_message("oc_1", "别说话")).await;
        // Exactly the muted-face emoji — no model call, no error message.
        assert_eq!(chat.texts().await, vec![MSG_ZIP_REPLY.to_string()]);
        assert!(engine.state.is_conversation_active("oc_1"));
    }

    #[tokio::test]
    async fn sticky_window_is_vetoed_by_other_mentions() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        engine.state.mark_conversation_active("oc_1");
        let mut event = group_message("oc_1", "@张三 你看看");
        event.mentions = vec![Mention {
            app_id: None,
            name: Some("张三".into()),
        }];
        engine.handle_message(event).await;
        // Falls to proactive; score is low, so nothing goes out.
        assert!(chat.texts().await.is_empty());
    }

    #[tokio::test]
    async fn direct_chats_have_no_sticky_window() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        engine.state.mark_conversation_active("oc_1");
        let mut event = group_message("oc_1", "别说话");
        event.chat_type = Some(ChatType::Direct);
        engine.handle_message(event).await;
        assert!(chat.texts().await.is_empty());
    }

    #[tokio::test]
    async fn quiet_mode_suppresses_proactive_but_still_persists() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine_with_store(chat.clone());
        engine
            .store
            .as_ref()
            .unwrap()
            .set_mode("oc_1", ChatMode::Quiet)
            .unwrap();
        engine
            .handle_message(group_message("oc_1", "这个怎么办？"))
            .await;
        assert!(chat.texts().await.is_empty());
        let stored = engine
            .store
            .as_ref()
            .unwrap()
            .recent_messages("oc_1", 10)
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn reset_clears_ring_sticky_and_settings() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine_with_store(chat.clone());
        let store = engine.store.as_ref().unwrap();
        store.set_mode("oc_1", ChatMode::Quiet).unwrap();
        store.set_threshold("oc_1", 0.9).unwrap();
        engine.state.mark_conversation_active("oc_1");
        engine.handle_message(group_message("oc_1", "占位消息")).await;

        engine.handle_message(group_message("oc_1", "/reset")).await;

        assert!(!engine.state.is_conversation_active("oc_1"));
        assert!(engine.state.recent_messages("oc_1", 10).is_empty());
        let settings = store.get_or_create_settings("oc_1", 0.65).unwrap();
        assert_eq!(settings.mode, ChatMode::Normal);
        assert_eq!(settings.threshold, 0.65);
        assert_eq!(chat.texts().await.last().unwrap(), MSG_RESET_DONE);
    }

    #[tokio::test]
    async fn settings_threshold_is_clamped_via_command() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine_with_store(chat.clone());
        engine
            .handle_message(group_message("oc_1", "/settings threshold 1.8"))
            .await;
        let settings = engine
            .store
            .as_ref()
            .unwrap()
            .get_or_create_settings("oc_1", 0.65)
            .unwrap();
        assert_eq!(settings.threshold, 1.0);
        assert!(chat.texts().await[0].contains("已将主动发言阈值设置为 1"));
    }

    #[tokio::test]
    async fn unknown_slash_text_falls_through_to_addressing() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        engine.state.mark_conversation_active("oc_1");
        engine.handle_message(group_message("oc_1", "/shrug")).await;
        // Treated as an addressed message inside the sticky window; with an
        // unconfigured LLM the reply path degrades to the failure message.
        assert_eq!(chat.texts().await, vec![MSG_LLM_UNAVAILABLE.to_string()]);
    }

    #[tokio::test]
    async fn draw_without_image_model_sends_announce_then_no_config() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        let images = Vec::new();
        engine.handle_draw_request("oc_1", "画一只猫", &images).await;
        assert_eq!(
            chat.texts().await,
            vec![MSG_DRAWING.to_string(), MSG_DRAW_NO_CONFIG.to_string()]
        );
    }

    #[tokio::test]
    async fn member_join_event_routes_to_welcome() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        let payload = serde_json::json!({
            "chat_id": "oc_1",
            "users": [{"name": "张三"}],
        });
        engine
            .handle_event("im.chat.member.user.added_v1", "E1", payload)
            .await;
        // Welcome generation fails silently with an unconfigured model.
        assert!(chat.texts().await.is_empty());
    }

    #[tokio::test]
    async fn quote_expansion_prefixes_the_parent() {
        let chat = Arc::new(RecordingChat::default());
        chat.set_message_text("om_parent", "原始消息").await;
        let engine = test_engine(chat.clone());
        let mut event = group_message("oc_1", "这句啥意思");
        event.parent_message_id = Some("om_parent".into());
        let expanded = engine.expand_quote(&event, "这句啥意思").await;
        assert!(expanded.starts_with("（当前这条消息是对下面这句话的回复/引用：原始消息）"));
        assert!(expanded.ends_with("这句啥意思"));
    }

    #[tokio::test]
    async fn quote_expansion_survives_fetch_failure() {
        let chat = Arc::new(RecordingChat::default());
        let engine = test_engine(chat.clone());
        let mut event = group_message("oc_1", "这句啥意思");
        event.parent_message_id = Some("om_missing".into());
        let expanded = engine.expand_quote(&event, "这句啥意思").await;
        assert_eq!(expanded, "这句啥意思");
    }
}
