//! Text-to-image and image-to-image over a chat-completions-style endpoint.
//!
//! The request is a normal multimodal chat call with a `modalities` hint; the
//! aspect ratio rides in the system message, the reference image (if any)
//! precedes the prompt text in the user content array, and the result comes
//! back as a base64 blob inside `multi_mod_content[].inline_data.data`.

use base64::Engine as _;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use tolan_core::config::TolanConfig;
use tolan_core::constants::{PROMPT_TEMPLATE_IMAGE_GEN, PROMPT_TEMPLATE_IMAGE_TO_IMAGE};

use crate::error::{ImageError, Result};
use crate::size::{aspect_ratio_token, parse_size_from_text};

pub struct ImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_size: u32,
}

impl ImageClient {
    /// Returns `None` when the image model is not configured; callers then
    /// answer with the fixed "not configured" message instead of failing.
    pub fn from_config(config: &TolanConfig) -> Option<Self> {
        if config.image_model_base_url.is_empty() || config.image_model_api_key.is_empty() {
            return None;
        }
        Some(Self {
            http: reqwest::Client::new(),
            base_url: config.image_model_base_url.clone(),
            api_key: config.image_model_api_key.clone(),
            model: config.image_model.clone(),
            timeout: Duration::from_secs(config.image_timeout),
            max_size: config.image_max_size,
        })
    }

    /// Generate an image for `prompt`, optionally steered by a reference
    /// image. Returns the decoded image bytes.
    pub async fn generate(&self, prompt: &str, reference: Option<&[u8]>) -> Result<Vec<u8>> {
        let clean_prompt = strip_leading_mention(prompt);

        let reference_size = reference.and_then(|bytes| {
            imagesize::blob_size(bytes)
                .map(|dim| (dim.width as u32, dim.height as u32))
                .map_err(|e| {
                    warn!(error = %e, "reference image size unreadable, using defaults");
                    e
                })
                .ok()
        });
        let (width, height) = parse_size_from_text(clean_prompt, reference_size, self.max_size);
        let ratio = aspect_ratio_token(width, height);

        info!(
            prompt = %clean_prompt.chars().take(50).collect::<String>(),
            width, height, ratio = %ratio,
            has_reference = reference.is_some(),
            "generating image"
        );

        let body = build_request_body(&self.model, clean_prompt, reference, &ratio);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status >= 300 {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(ImageError::Api { status, message });
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| ImageError::Decode(e.to_string()))?;
        let bytes = extract_image_bytes(&data)?;
        debug!(size = bytes.len(), "image generated");
        Ok(bytes)
    }
}

/// Drop a leading `@mention` token so the bot's name never leaks into the
/// drawing prompt.
pub(crate) fn strip_leading_mention(prompt: &str) -> &str {
    let trimmed = prompt.trim();
    if let Some(rest) = trimmed.strip_prefix('@') {
        match rest.split_once(char::is_whitespace) {
            Some((_, tail)) => tail.trim(),
            None => trimmed,
        }
    } else {
        trimmed
    }
}

pub(crate) fn build_request_body(
    model: &str,
    prompt: &str,
    reference: Option<&[u8]>,
    aspect_ratio: &str,
) -> Value {
    let template = if reference.is_some() {
        PROMPT_TEMPLATE_IMAGE_TO_IMAGE
    } else {
        PROMPT_TEMPLATE_IMAGE_GEN
    };
    let full_prompt = template.replace("{prompt}", prompt);

    // Reference image goes before the text.
    let mut user_content = Vec::new();
    if let Some(bytes) = reference {
        let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        user_content.push(json!({
            "type": "image_url",
            "image_url": {"url": format!("data:image/png;base64,{b64}")},
        }));
    }
    user_content.push(json!({"type": "text", "text": full_prompt}));

    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": format!("aspect_ratio={aspect_ratio}")},
            {"role": "user", "content": user_content},
        ],
        "modalities": ["text", "image"],
    })
}

/// Walk `choices[0].message.multi_mod_content` for the first inline_data
/// blob and base64-decode it.
pub(crate) fn extract_image_bytes(data: &Value) -> Result<Vec<u8>> {
    let parts = data
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("multi_mod_content"))
        .and_then(|c| c.as_array())
        .ok_or_else(|| ImageError::NoImage("no multi_mod_content in response".to_string()))?;

    for part in parts {
        if let Some(encoded) = part
            .get("inline_data")
            .and_then(|d| d.get("data"))
            .and_then(|d| d.as_str())
        {
            if encoded.is_empty() {
                continue;
            }
            return base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| ImageError::Decode(e.to_string()));
        }
    }
    Err(ImageError::NoImage(
        "no image data found in response".to_string(),
    ))
}
