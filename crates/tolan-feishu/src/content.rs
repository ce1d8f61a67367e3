//! Message payload extraction.
//!
//! Feishu delivers message content as a JSON string whose shape depends on
//! `message_type`: plain `{"text"}`, `{"image_key"}`, or a rich-text `post`
//! with an optional `zh_cn`/`en_us` language wrapper and a matrix of tagged
//! paragraphs. Extraction flattens all readable text and collects every
//! image key.

use serde_json::Value;
use tracing::debug;

use tolan_core::types::{ChatType, Mention, MessageEvent, SenderKind};

/// Normalize a `im.message.receive_v1` payload into a `MessageEvent`.
pub fn extract_message_event(payload: &Value) -> MessageEvent {
    let message = payload.get("message").cloned().unwrap_or(Value::Null);

    let chat_id = message
        .get("chat_id")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let chat_type = message
        .get("chat_type")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ChatType::parse);
    let message_id = message
        .get("message_id")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let parent_message_id = message
        .get("parent_id")
        .or_else(|| message.get("root_id"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from);

    // Sender id can live on the message or the outer event; prefer user_id,
    // fall back to open_id.
    let sender_obj = message
        .pointer("/sender/sender_id")
        .or_else(|| payload.pointer("/sender/sender_id"))
        .cloned()
        .unwrap_or(Value::Null);
    let sender_id = sender_obj
        .get("user_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| sender_obj.get("open_id").and_then(Value::as_str))
        .unwrap_or("")
        .to_string();
    let sender_kind = payload
        .pointer("/sender/sender_type")
        .or_else(|| payload.pointer("/sender/type"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(SenderKind::parse);

    let mut msg_type = message
        .get("message_type")
        .or_else(|| message.get("msg_type"))
        .or_else(|| message.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let content_raw = message.get("content").and_then(Value::as_str).unwrap_or("{}");
    let content: Value = serde_json::from_str(content_raw).unwrap_or(Value::Null);

    let mut text = String::new();
    let mut image_keys = Vec::new();
    if let Some(obj) = content.as_object() {
        if let Some(t) = obj.get("text").and_then(Value::as_str) {
            text = t.to_string();
        }
        if let Some(key) = obj.get("image_key").and_then(Value::as_str) {
            if !key.trim().is_empty() {
                image_keys.push(key.trim().to_string());
            }
        }

        // post: language wrapper, or wrapper-less {"title", "content"}.
        if let Some(lang_obj) = obj.get("zh_cn").or_else(|| obj.get("en_us")) {
            parse_post(lang_obj, &mut text, &mut image_keys);
        } else if obj.get("content").map(Value::is_array).unwrap_or(false) {
            parse_post(&content, &mut text, &mut image_keys);
        }
    }

    // Keys found but no declared type means an image message.
    if msg_type.is_empty() && !image_keys.is_empty() {
        msg_type = "image".to_string();
    }

    let mentions = message
        .get("mentions")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(parse_mention).collect())
        .unwrap_or_default();

    debug!(
        chat_id,
        msg_type,
        text_len = text.len(),
        images = image_keys.len(),
        "message payload extracted"
    );

    MessageEvent {
        chat_id,
        chat_type,
        sender_id,
        sender_kind,
        message_id,
        parent_message_id,
        text,
        image_keys,
        mentions,
        msg_type,
    }
}

/// One post body: `title` plus a `content` matrix of `[tag, ...]` paragraphs.
fn parse_post(lang_obj: &Value, text: &mut String, image_keys: &mut Vec<String>) {
    if let Some(title) = lang_obj.get("title").and_then(Value::as_str) {
        if !title.is_empty() {
            append_line(text, title);
        }
    }
    let Some(paragraphs) = lang_obj.get("content").and_then(Value::as_array) else {
        return;
    };
    let mut pieces = Vec::new();
    for paragraph in paragraphs {
        let Some(elements) = paragraph.as_array() else {
            continue;
        };
        for element in elements {
            match element.get("tag").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(t) = element.get("text").and_then(Value::as_str) {
                        pieces.push(t.to_string());
                    }
                }
                Some("img") => {
                    if let Some(key) = element.get("image_key").and_then(Value::as_str) {
                        if !key.trim().is_empty() {
                            image_keys.push(key.trim().to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }
    let joined = pieces.concat();
    let joined = joined.trim();
    if !joined.is_empty() {
        append_line(text, joined);
    }
}

fn append_line(text: &mut String, line: &str) {
    if text.is_empty() {
        text.push_str(line);
    } else {
        text.push('\n');
        text.push_str(line);
    }
}

fn parse_mention(entry: &Value) -> Mention {
    Mention {
        app_id: entry
            .pointer("/id/app_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from),
        name: entry
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from),
    }
}
