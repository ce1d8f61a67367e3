//! LLM-backed intent classification with JSON repair.
//!
//! The classifier is the sole draw-vs-chat decider for addressed messages.
//! Small models are sloppy about output format, so parsing runs a repair
//! ladder: strict JSON, then fence-stripping plus balanced-brace extraction,
//! then a conservative default.

use serde_json::Value;
use tracing::{debug, warn};

use tolan_core::constants::{SEARCH_INDICATORS, TEMPERATURE_INTENT};

use crate::client::LlmClient;

const INTENT_SYSTEM_PROMPT: &str = r#"你是一个用户意图分类助手。分析用户的消息，快速判断用户的真实意图。

严格按照以下规则分类：
1. "draw" - 用户要求生成、绘制、修改图片
   - 文生图: 画xxxx、生成xxxx、设计xxxx等
   - 图生图: 改成xxxx风格、修改这个xxxx、重绘成xxxx等（即使没有明确说"生成图片"）
2. "command" - 用户发送命令（以/开头）或要求特定操作
3. "chat" - 日常闲聊或提问
4. "other" - 其他

返回 JSON 格式结果，包含：
- task_type: 上述分类之一
- confidence: 0.0-1.0 的置信度
- is_image_modification: 如果是draw，是否是图生图（true）还是文生图（false）
- needs_reference_image: 如果是draw且是图生图，是否需要参考图片
- reason: 简短的分类理由

仅返回 JSON，不要其他文字。"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Draw,
    Chat,
    Command,
    Other,
}

impl TaskType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "draw" => Some(TaskType::Draw),
            "chat" => Some(TaskType::Chat),
            "command" => Some(TaskType::Command),
            "other" => Some(TaskType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentResult {
    pub task_type: TaskType,
    pub confidence: f64,
    pub is_image_modification: bool,
    pub needs_reference_image: bool,
    pub reason: String,
}

impl IntentResult {
    /// Conservative fallback when classification fails.
    fn fallback(reason: &str) -> Self {
        Self {
            task_type: TaskType::Other,
            confidence: 0.5,
            is_image_modification: false,
            needs_reference_image: false,
            reason: reason.to_string(),
        }
    }
}

/// Classify a user message. Never fails — any error collapses to the
/// conservative default so the caller can always branch on `task_type`.
pub async fn classify_intent(client: &LlmClient, text: &str, has_images: bool) -> IntentResult {
    if text.trim().is_empty() {
        return IntentResult {
            confidence: 0.0,
            reason: "empty message".to_string(),
            ..IntentResult::fallback("empty message")
        };
    }

    let user_prompt = format!("用户消息: \"{text}\"\n是否包含图片: {has_images}\n\n分类这条消息。");

    let response = match client
        .small_chat(&user_prompt, INTENT_SYSTEM_PROMPT, TEMPERATURE_INTENT)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "intent classification call failed");
            return IntentResult::fallback("classification failed");
        }
    };

    match parse_intent_response(&response) {
        Some(result) => {
            debug!(
                task_type = ?result.task_type,
                confidence = result.confidence,
                "intent classified"
            );
            result
        }
        None => {
            warn!(response = %response.chars().take(300).collect::<String>(),
                  "intent response unparseable");
            IntentResult::fallback("classification failed")
        }
    }
}

/// Strict parse first, then repair. Returns `None` only when no JSON object
/// with a `task_type` field can be recovered.
pub fn parse_intent_response(response: &str) -> Option<IntentResult> {
    let value = serde_json::from_str::<Value>(response.trim())
        .ok()
        .or_else(|| extract_json_object(response))?;
    let obj = value.as_object()?;

    let task_type_str = obj.get("task_type")?.as_str()?;
    let task_type = TaskType::parse(task_type_str).unwrap_or(TaskType::Other);

    Some(IntentResult {
        task_type,
        confidence: obj
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0),
        is_image_modification: obj
            .get("is_image_modification")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        needs_reference_image: obj
            .get("needs_reference_image")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        reason: obj
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

/// Strip markdown fences and pull out the outermost balanced `{…}`.
fn extract_json_object(text: &str) -> Option<Value> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let start = cleaned.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in cleaned[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &cleaned[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether the answer pipeline should issue a search-engine call: the
/// classifier saw a conversational question and the text or its reasoning
/// carries a time-sensitive marker.
pub fn should_use_web_search(intent: &IntentResult, question: &str) -> bool {
    if matches!(intent.task_type, TaskType::Draw | TaskType::Command) {
        return false;
    }
    let question_lower = question.to_lowercase();
    let reason_lower = intent.reason.to_lowercase();
    SEARCH_INDICATORS
        .iter()
        .any(|marker| question_lower.contains(marker) || reason_lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_parses() {
        let r = parse_intent_response(r#"{"task_type":"draw","confidence":0.9,"is_image_modification":true}"#).unwrap();
        assert_eq!(r.task_type, TaskType::Draw);
        assert!(r.is_image_modification);
        assert!((r.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn markdown_fenced_json_is_repaired() {
        let raw = "```json\n{\"task_type\":\"chat\",\"confidence\":0.8}\n```";
        let r = parse_intent_response(raw).unwrap();
        assert_eq!(r.task_type, TaskType::Chat);
        assert!((r.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn json_embedded_in_prose_is_extracted() {
        let raw = "好的，分类结果如下：{\"task_type\":\"draw\",\"confidence\":0.7,\"reason\":\"画图\"} 希望有帮助";
        let r = parse_intent_response(raw).unwrap();
        assert_eq!(r.task_type, TaskType::Draw);
        assert_eq!(r.reason, "画图");
    }

    #[test]
    fn nested_braces_stay_balanced() {
        let raw = r#"{"task_type":"chat","confidence":0.6,"extra":{"a":1}} trailing"#;
        let r = parse_intent_response(raw).unwrap();
        assert_eq!(r.task_type, TaskType::Chat);
    }

    #[test]
    fn unknown_task_type_degrades_to_other() {
        let r = parse_intent_response(r#"{"task_type":"paint","confidence":0.9}"#).unwrap();
        assert_eq!(r.task_type, TaskType::Other);
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_intent_response("not json at all").is_none());
        assert!(parse_intent_response("{unbalanced").is_none());
    }

    #[test]
    fn confidence_is_clamped() {
        let r = parse_intent_response(r#"{"task_type":"chat","confidence":3.0}"#).unwrap();
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn draw_intent_never_searches() {
        let intent = IntentResult {
            task_type: TaskType::Draw,
            confidence: 0.9,
            is_image_modification: false,
            needs_reference_image: false,
            reason: "最新风格".into(),
        };
        assert!(!should_use_web_search(&intent, "画一张最新的图"));
    }

    #[test]
    fn time_sensitive_question_searches() {
        let intent = IntentResult {
            task_type: TaskType::Chat,
            confidence: 0.8,
            is_image_modification: false,
            needs_reference_image: false,
            reason: String::new(),
        };
        assert!(should_use_web_search(&intent, "今天的新闻有哪些"));
        assert!(!should_use_web_search(&intent, "你喜欢什么颜色"));
    }

    #[tokio::test]
    async fn empty_text_short_circuits() {
        let client = LlmClient::new(None, None);
        let r = classify_intent(&client, "   ", false).await;
        assert_eq!(r.task_type, TaskType::Other);
        assert_eq!(r.confidence, 0.0);
    }

    #[tokio::test]
    async fn unconfigured_client_falls_back() {
        let client = LlmClient::new(None, None);
        let r = classify_intent(&client, "画一只猫", false).await;
        assert_eq!(r.task_type, TaskType::Other);
        assert!((r.confidence - 0.5).abs() < 1e-9);
    }
}
