//! Chat-completions client for the main and small models.
//!
//! Three call shapes share one request/response format: plain text,
//! multimodal (text + images as data URLs), and the small-model classifier
//! call which transparently falls back to the main model when no dedicated
//! endpoint is configured.

use base64::Engine as _;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use tolan_core::config::TolanConfig;

use crate::error::{LlmError, Result};

/// One chat-completions endpoint: base URL, key, model and per-call timeout.
#[derive(Debug, Clone)]
pub struct LlmEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl LlmEndpoint {
    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Image bytes plus MIME type, ready to be framed as a data URL.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ImageAttachment {
    pub fn data_url(&self) -> String {
        let mime = if self.mime.is_empty() {
            "image/jpeg"
        } else {
            &self.mime
        };
        let b64 = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{mime};base64,{b64}")
    }
}

pub struct LlmClient {
    http: reqwest::Client,
    main: Option<LlmEndpoint>,
    small: Option<LlmEndpoint>,
}

impl LlmClient {
    pub fn new(main: Option<LlmEndpoint>, small: Option<LlmEndpoint>) -> Self {
        Self {
            http: reqwest::Client::new(),
            main,
            small,
        }
    }

    /// Endpoints from config. An endpoint exists only when base URL, key and
    /// model name are all present.
    pub fn from_config(config: &TolanConfig) -> Self {
        let main = endpoint_from(
            &config.llm_base_url,
            &config.llm_api_key,
            &config.llm_model,
            config.llm_timeout,
        );
        let small = endpoint_from(
            &config.small_model_base_url,
            &config.small_model_api_key,
            &config.small_model,
            config.small_model_timeout,
        );
        Self::new(main, small)
    }

    pub fn is_configured(&self) -> bool {
        self.main.is_some()
    }

    /// Text-only chat call against the main model.
    pub async fn chat(&self, prompt: &str, system: &str, temperature: f64) -> Result<String> {
        let endpoint = self.main.as_ref().ok_or(LlmError::NotConfigured)?;
        let content = Value::String(prompt.to_string());
        self.send(endpoint, system, content, temperature).await
    }

    /// Multimodal chat call: prompt text followed by image data-URL parts.
    pub async fn chat_with_images(
        &self,
        prompt: &str,
        images: &[ImageAttachment],
        system: &str,
        temperature: f64,
    ) -> Result<String> {
        let endpoint = self.main.as_ref().ok_or(LlmError::NotConfigured)?;
        let content = multimodal_content(prompt, images);
        self.send(endpoint, system, content, temperature).await
    }

    /// Small-model call for intent classification. Routed to the dedicated
    /// small endpoint when configured; any failure there falls back to the
    /// main model so classification stays available.
    pub async fn small_chat(&self, prompt: &str, system: &str, temperature: f64) -> Result<String> {
        if let Some(endpoint) = &self.small {
            let content = Value::String(prompt.to_string());
            match self.send(endpoint, system, content, temperature).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(error = %e, "small model call failed, falling back to main LLM");
                }
            }
        }
        self.chat(prompt, system, temperature).await
    }

    async fn send(
        &self,
        endpoint: &LlmEndpoint,
        system: &str,
        user_content: Value,
        temperature: f64,
    ) -> Result<String> {
        let body = build_request_body(&endpoint.model, system, user_content, temperature);
        debug!(model = %endpoint.model, temperature, "sending chat-completions request");

        let resp = self
            .http
            .post(endpoint.chat_url())
            .bearer_auth(&endpoint.api_key)
            .header("content-type", "application/json")
            .timeout(endpoint.timeout)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status >= 300 {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status,
                message: truncate(&text, 200),
            });
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        parse_chat_response(&data)
    }
}

fn endpoint_from(base_url: &str, api_key: &str, model: &str, timeout: u64) -> Option<LlmEndpoint> {
    if base_url.is_empty() || api_key.is_empty() || model.is_empty() {
        return None;
    }
    Some(LlmEndpoint {
        base_url: base_url.to_string(),
        api_key: api_key.to_string(),
        model: model.to_string(),
        timeout: Duration::from_secs(timeout),
    })
}

pub(crate) fn build_request_body(
    model: &str,
    system: &str,
    user_content: Value,
    temperature: f64,
) -> Value {
    let mut messages = Vec::new();
    if !system.is_empty() {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": user_content}));
    json!({
        "model": model,
        "temperature": temperature,
        "messages": messages,
    })
}

/// Ordered content parts: text first, then one `image_url` part per image.
pub(crate) fn multimodal_content(prompt: &str, images: &[ImageAttachment]) -> Value {
    let mut parts = vec![json!({"type": "text", "text": prompt})];
    for image in images {
        if image.bytes.is_empty() {
            continue;
        }
        parts.push(json!({
            "type": "image_url",
            "image_url": {"url": image.data_url()},
        }));
    }
    Value::Array(parts)
}

pub(crate) fn parse_chat_response(data: &Value) -> Result<String> {
    data.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| LlmError::Parse(format!("unexpected response shape: {}", truncate(&data.to_string(), 200))))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_system_and_user() {
        let body = build_request_body("gpt-4o-mini", "be brief", Value::String("hi".into()), 0.2);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn empty_system_is_omitted() {
        let body = build_request_body("m", "", Value::String("hi".into()), 0.2);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn multimodal_content_puts_text_first() {
        let images = vec![ImageAttachment {
            bytes: vec![1, 2, 3],
            mime: "image/png".into(),
        }];
        let content = multimodal_content("describe", &images);
        let parts = content.as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn empty_image_bytes_are_skipped() {
        let images = vec![ImageAttachment {
            bytes: vec![],
            mime: String::new(),
        }];
        let content = multimodal_content("describe", &images);
        assert_eq!(content.as_array().unwrap().len(), 1);
    }

    #[test]
    fn data_url_defaults_to_jpeg() {
        let att = ImageAttachment {
            bytes: vec![0xFF],
            mime: String::new(),
        };
        assert!(att.data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn response_content_is_extracted() {
        let data = serde_json::json!({
            "choices": [{"message": {"content": "hello"}}]
        });
        assert_eq!(parse_chat_response(&data).unwrap(), "hello");
    }

    #[test]
    fn malformed_response_is_a_parse_error() {
        let data = serde_json::json!({"error": {"message": "nope"}});
        assert!(matches!(
            parse_chat_response(&data),
            Err(LlmError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_client_reports_not_configured() {
        let client = LlmClient::new(None, None);
        assert!(matches!(
            client.chat("hi", "", 0.2).await,
            Err(LlmError::NotConfigured)
        ));
    }
}
