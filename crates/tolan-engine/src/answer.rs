//! The answer pipeline for addressed messages: context, quote expansion,
//! image fetch, intent classification, optional web enrichment, prompt
//! assembly, the thinking-timer race, and delivery.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use tolan_core::constants::{MSG_LLM_UNAVAILABLE, TEMPERATURE_CHAT};
use tolan_core::types::MessageEvent;
use tolan_llm::{classify_intent, should_use_web_search, ImageAttachment, LlmError, TaskType};
use tolan_web::{extract_urls, fetch_webpage};

use crate::engine::Engine;
use crate::persona;
use crate::summary::build_context_summary;
use crate::thinking::ThinkingGuard;

/// Transient remote failures log WARN; provider 4xx logs ERROR. The
/// user-visible string is the same either way.
pub(crate) fn log_llm_failure(chat_id: &str, e: &LlmError, what: &str) {
    if e.is_permanent() {
        error!(chat_id, error = %e, "{what} failed (permanent)");
    } else {
        warn!(chat_id, error = %e, "{what} failed");
    }
}

impl Engine {
    /// Handle a message that addresses the bot (mention or sticky window).
    /// `question` is the stored text (image placeholder suffix included).
    pub(crate) async fn answer_addressed(&self, event: &MessageEvent, question: &str) {
        let chat_id = &event.chat_id;

        // 1. Recent context, database first, ring fallback.
        let messages = self.context_messages(chat_id, self.config.max_context_messages);
        let context = build_context_summary(&messages, self.config.max_context_messages);

        // 2. Inline the quoted parent message, when the event is a reply.
        let question = self.expand_quote(event, question).await;

        // 3. Attached images, capped; failures are skipped.
        let images = self.fetch_event_images(event).await;

        // 4. The classifier is the sole draw-vs-chat decider.
        let intent = classify_intent(&self.llm, &question, !images.is_empty()).await;
        if intent.task_type == TaskType::Draw {
            info!(chat_id, confidence = intent.confidence, "draw intent detected");
            self.handle_draw_request(chat_id, &question, &images).await;
            self.state.mark_conversation_active(chat_id);
            return;
        }

        // 5. Web enrichment: inline URLs first, otherwise maybe one search.
        let web_context = self.build_web_context(&question, &intent).await;

        // 6. Prompt assembly.
        let settings = self.settings_for(chat_id);
        let system = persona::system_prompt(&settings);
        let prompt = if web_context.is_empty() {
            tolan_core::constants::PROMPT_TEMPLATE_CHAT
                .replace("{context}", &context)
                .replace("{question}", &question)
        } else {
            format!("群上下文：\n{context}{web_context}\n\n用户问题：{question}\n请用简短要点直接回答。")
        };

        // 7+8. Thinking timer races the model call.
        let thinking = ThinkingGuard::start(
            Arc::clone(&self.chat),
            chat_id.clone(),
            Duration::from_secs_f64(self.config.thinking_message_delay),
            !images.is_empty(),
        );
        let result = if images.is_empty() {
            self.llm.chat(&prompt, &system, TEMPERATURE_CHAT).await
        } else {
            self.llm
                .chat_with_images(&prompt, &images, &system, TEMPERATURE_CHAT)
                .await
        };
        // The companion must settle before the reply goes out.
        thinking.finish().await;

        // 9. Deliver and extend the sticky window.
        match result {
            Ok(reply) => self.chat.send_text(chat_id, &reply).await,
            Err(e) => {
                log_llm_failure(chat_id, &e, "answer");
                self.chat.send_text(chat_id, MSG_LLM_UNAVAILABLE).await;
            }
        }
        self.state.mark_conversation_active(chat_id);
    }

    /// Prefix the quoted parent message, labeled, to the question. Fetch
    /// failures keep the original question.
    pub(crate) async fn expand_quote(&self, event: &MessageEvent, question: &str) -> String {
        let Some(parent_id) = event.parent_message_id.as_deref() else {
            return question.to_string();
        };
        let quoted = self.chat.get_message_text(parent_id).await;
        if quoted.is_empty() {
            return question.to_string();
        }
        format!("（当前这条消息是对下面这句话的回复/引用：{quoted}）\n{question}")
    }

    /// Fetch up to the configured number of attached images.
    pub(crate) async fn fetch_event_images(&self, event: &MessageEvent) -> Vec<ImageAttachment> {
        let mut images = Vec::new();
        if event.message_id.is_empty() {
            return images;
        }
        for key in event.image_keys.iter().take(self.config.max_images_per_message) {
            match self.chat.get_message_media(&event.message_id, key).await {
                Some((bytes, mime)) => images.push(ImageAttachment {
                    bytes,
                    mime: if mime.is_empty() {
                        "image/jpeg".to_string()
                    } else {
                        mime
                    },
                }),
                None => warn!(key, "image fetch failed, skipping"),
            }
        }
        images
    }

    /// Build the optional web block: up to two inline URLs fetched and
    /// excerpted, else up to three search snippets when the question looks
    /// time-sensitive.
    async fn build_web_context(&self, question: &str, intent: &tolan_llm::IntentResult) -> String {
        let urls = extract_urls(question);
        if !urls.is_empty() {
            info!(count = urls.len(), "URLs found in question");
            let pages = fetch_webpage(&self.fetcher, &urls, 2).await;
            if !pages.is_empty() {
                let mut block = String::from("\n\n【网页内容】\n");
                for (url, content) in pages {
                    let excerpt: String = content.chars().take(1000).collect();
                    block.push_str(&format!("来自 {url}:\n{excerpt}\n\n"));
                }
                return block;
            }
            return String::new();
        }

        if let Some(search) = &self.search {
            if should_use_web_search(intent, question) {
                info!(
                    preview = %question.chars().take(80).collect::<String>(),
                    "question looks time-sensitive, searching"
                );
                match search.search(question, 3).await {
                    Ok(results) => return format!("\n\n【搜索结果】\n{results}"),
                    Err(e) => warn!(error = %e, "web search failed"),
                }
            }
        }
        String::new()
    }
}
