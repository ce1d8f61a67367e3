//! Feishu REST client with a cached tenant access token.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use tolan_core::config::TolanConfig;

use crate::chat::ChatClient;
use crate::error::{FeishuError, Result};

const TIMEOUT_DEFAULT: Duration = Duration::from_secs(10);
const TIMEOUT_UPLOAD: Duration = Duration::from_secs(30);
const TIMEOUT_MEDIA: Duration = Duration::from_secs(20);

/// Refresh the tenant token when it is within this window of expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Default)]
struct TokenCache {
    token: String,
    expires_at: Option<Instant>,
}

pub struct FeishuClient {
    http: reqwest::Client,
    api_base: String,
    app_id: String,
    app_secret: String,
    /// Held across the refresh call, so concurrent tasks single-flight
    /// instead of stampeding the auth endpoint.
    token: Mutex<TokenCache>,
}

impl FeishuClient {
    pub fn from_config(config: &TolanConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.feishu_api_base.trim_end_matches('/').to_string(),
            app_id: config.feishu_app_id.clone(),
            app_secret: config.feishu_app_secret.clone(),
            token: Mutex::new(TokenCache::default()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    async fn tenant_access_token(&self) -> Result<String> {
        let mut cache = self.token.lock().await;
        if let Some(expires_at) = cache.expires_at {
            if !cache.token.is_empty() && Instant::now() + TOKEN_REFRESH_MARGIN < expires_at {
                return Ok(cache.token.clone());
            }
        }

        let resp = self
            .http
            .post(self.url("/auth/v3/tenant_access_token/internal"))
            .timeout(TIMEOUT_DEFAULT)
            .json(&json!({"app_id": self.app_id, "app_secret": self.app_secret}))
            .send()
            .await?;
        let data: Value = resp
            .json()
            .await
            .map_err(|e| FeishuError::Auth(e.to_string()))?;

        if data.get("code").and_then(Value::as_i64).unwrap_or(0) != 0 {
            return Err(FeishuError::Auth(data.to_string()));
        }
        let token = data
            .get("tenant_access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| FeishuError::Auth("no tenant_access_token in response".to_string()))?
            .to_string();
        let expire = data.get("expire").and_then(Value::as_u64).unwrap_or(0);

        debug!(expire, "tenant access token refreshed");
        cache.token = token.clone();
        cache.expires_at = Some(Instant::now() + Duration::from_secs(expire));
        Ok(token)
    }

    /// POST a message body to the send endpoint, logging API-level failures.
    async fn post_message(&self, chat_id: &str, msg_type: &str, content: String) {
        let token = match self.tenant_access_token().await {
            Ok(t) => t,
            Err(e) => {
                error!(chat_id, error = %e, "cannot send message without token");
                return;
            }
        };
        let payload = json!({
            "receive_id": chat_id,
            "msg_type": msg_type,
            "content": content,
        });
        let result = self
            .http
            .post(self.url("/im/v1/messages?receive_id_type=chat_id"))
            .bearer_auth(&token)
            .timeout(TIMEOUT_DEFAULT)
            .json(&payload)
            .send()
            .await;
        match result {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(data) if data.get("code").and_then(Value::as_i64) != Some(0) => {
                    error!(chat_id, msg_type, response = %data, "message send rejected");
                }
                Ok(_) => debug!(chat_id, msg_type, "message sent"),
                Err(e) => error!(chat_id, error = %e, "message send response unreadable"),
            },
            Err(e) => error!(chat_id, error = %e, "message send failed"),
        }
    }
}

#[async_trait]
impl ChatClient for FeishuClient {
    async fn send_text(&self, chat_id: &str, text: &str) {
        debug!(chat_id, preview = %text.chars().take(80).collect::<String>(), "send_text");
        let content = json!({"text": text}).to_string();
        self.post_message(chat_id, "text", content).await;
    }

    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String> {
        let token = self.tenant_access_token().await?;
        debug!(size = bytes.len(), "uploading image");

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|e| FeishuError::Api(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("image_type", "message");

        let resp = self
            .http
            .post(self.url("/im/v1/images"))
            .bearer_auth(&token)
            .timeout(TIMEOUT_UPLOAD)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| FeishuError::Api(format!("upload response unreadable: {e}")))?;
        if status >= 300 || data.get("code").and_then(Value::as_i64) != Some(0) {
            let msg = data
                .get("msg")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(FeishuError::Api(msg));
        }
        let image_key = data
            .pointer("/data/image_key")
            .and_then(Value::as_str)
            .unwrap_or("");
        if image_key.is_empty() {
            return Err(FeishuError::Api("no image_key in response".to_string()));
        }
        info!(image_key, "image uploaded");
        Ok(image_key.to_string())
    }

    async fn send_image(&self, chat_id: &str, image_key: &str, caption: &str) {
        debug!(chat_id, image_key, "send_image");
        let content = json!({"image_key": image_key}).to_string();
        self.post_message(chat_id, "image", content).await;
        if !caption.is_empty() {
            self.send_text(chat_id, caption).await;
        }
    }

    async fn get_message_text(&self, message_id: &str) -> String {
        if message_id.is_empty() {
            return String::new();
        }
        let token = match self.tenant_access_token().await {
            Ok(t) => t,
            Err(e) => {
                warn!(message_id, error = %e, "get_message_text without token");
                return String::new();
            }
        };
        let result = self
            .http
            .get(self.url(&format!("/im/v1/messages/{message_id}")))
            .bearer_auth(&token)
            .timeout(TIMEOUT_DEFAULT)
            .send()
            .await;
        let Ok(resp) = result else {
            return String::new();
        };
        if resp.status().as_u16() >= 300 {
            warn!(message_id, status = resp.status().as_u16(), "get_message_text http error");
            return String::new();
        }
        let Ok(data) = resp.json::<Value>().await else {
            return String::new();
        };
        if data.get("code").and_then(Value::as_i64).unwrap_or(0) != 0 {
            warn!(message_id, response = %data, "get_message_text rejected");
            return String::new();
        }
        let content_raw = data
            .pointer("/data/message/content")
            .and_then(Value::as_str)
            .unwrap_or("{}");
        serde_json::from_str::<Value>(content_raw)
            .ok()
            .and_then(|c| c.get("text").and_then(Value::as_str).map(String::from))
            .unwrap_or_default()
    }

    async fn get_message_media(&self, message_id: &str, key: &str) -> Option<(Vec<u8>, String)> {
        let message_id = message_id.trim();
        let key = key.trim();
        if message_id.is_empty() || key.is_empty() {
            warn!("get_message_media called with empty ids");
            return None;
        }
        let token = self.tenant_access_token().await.ok()?;
        let url = self.url(&format!(
            "/im/v1/messages/{message_id}/resources/{key}?type=image"
        ));
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .timeout(TIMEOUT_MEDIA)
            .send()
            .await
            .ok()?;
        if resp.status().as_u16() >= 300 {
            warn!(message_id, key, status = resp.status().as_u16(), "media fetch failed");
            return None;
        }
        let mime = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
            .unwrap_or_default();
        let bytes = resp.bytes().await.ok()?;
        debug!(message_id, key, mime = %mime, size = bytes.len(), "media fetched");
        Some((bytes.to_vec(), mime))
    }
}
