use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TolanError};

/// Top-level config (tolan.toml + environment overrides).
///
/// Keys are flat and match the documented environment variable names, so
/// `FEISHU_APP_ID` lands in `feishu_app_id` without any prefix mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TolanConfig {
    // Feishu credentials — the only required keys.
    #[serde(default)]
    pub feishu_app_id: String,
    #[serde(default)]
    pub feishu_app_secret: String,
    #[serde(default)]
    pub feishu_verification_token: String,
    #[serde(default)]
    pub feishu_encrypt_key: String,
    #[serde(default = "default_feishu_api_base")]
    pub feishu_api_base: String,

    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default)]
    pub bot_user_id: String,

    /// Path of the SQLite database file. Empty disables persistence — the
    /// bot keeps running on in-memory state only.
    #[serde(default)]
    pub database_url: String,

    // Main chat model
    #[serde(default)]
    pub llm_base_url: String,
    #[serde(default)]
    pub llm_api_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout: u64,

    // Small classifier model — optional; falls back to the main model.
    #[serde(default)]
    pub small_model_base_url: String,
    #[serde(default)]
    pub small_model_api_key: String,
    #[serde(default)]
    pub small_model: String,
    #[serde(default = "default_small_model_timeout")]
    pub small_model_timeout: u64,

    // Image model
    #[serde(default)]
    pub image_model_base_url: String,
    #[serde(default)]
    pub image_model_api_key: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_max_size")]
    pub image_max_size: u32,
    #[serde(default = "default_image_timeout")]
    pub image_timeout: u64,

    // Conversation behavior
    #[serde(default = "default_conversation_ttl")]
    pub conversation_ttl_seconds: u64,
    #[serde(default = "default_engage_threshold")]
    pub engage_default_threshold: f64,
    #[serde(default = "default_thinking_delay")]
    pub thinking_message_delay: f64,

    // In-memory bounds
    #[serde(default = "default_chat_logs_maxlen")]
    pub chat_logs_maxlen: usize,
    #[serde(default = "default_recent_events_maxlen")]
    pub recent_events_maxlen: usize,
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
    #[serde(default = "default_max_summary_messages")]
    pub max_summary_messages: usize,
    #[serde(default = "default_max_images_per_message")]
    pub max_images_per_message: usize,

    // Web search
    #[serde(default)]
    pub searxng_url: String,
    #[serde(default = "default_searxng_timeout")]
    pub searxng_timeout: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    // HTTP server
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for TolanConfig {
    fn default() -> Self {
        Self {
            feishu_app_id: String::new(),
            feishu_app_secret: String::new(),
            feishu_verification_token: String::new(),
            feishu_encrypt_key: String::new(),
            feishu_api_base: default_feishu_api_base(),
            bot_name: default_bot_name(),
            bot_user_id: String::new(),
            database_url: String::new(),
            llm_base_url: String::new(),
            llm_api_key: String::new(),
            llm_model: default_llm_model(),
            llm_timeout: default_llm_timeout(),
            small_model_base_url: String::new(),
            small_model_api_key: String::new(),
            small_model: String::new(),
            small_model_timeout: default_small_model_timeout(),
            image_model_base_url: String::new(),
            image_model_api_key: String::new(),
            image_model: default_image_model(),
            image_max_size: default_image_max_size(),
            image_timeout: default_image_timeout(),
            conversation_ttl_seconds: default_conversation_ttl(),
            engage_default_threshold: default_engage_threshold(),
            thinking_message_delay: default_thinking_delay(),
            chat_logs_maxlen: default_chat_logs_maxlen(),
            recent_events_maxlen: default_recent_events_maxlen(),
            max_context_messages: default_max_context_messages(),
            max_summary_messages: default_max_summary_messages(),
            max_images_per_message: default_max_images_per_message(),
            searxng_url: String::new(),
            searxng_timeout: default_searxng_timeout(),
            log_level: default_log_level(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl TolanConfig {
    /// Load config from an optional TOML file, overridden by environment
    /// variables using the same flat key names.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        } else {
            figment = figment.merge(Toml::file("tolan.toml"));
        }
        figment
            .merge(Env::raw())
            .extract()
            .map_err(|e| TolanError::Config(e.to_string()))
    }

    /// Names of required keys that are missing. Empty means valid.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.feishu_app_id.is_empty() {
            missing.push("FEISHU_APP_ID");
        }
        if self.feishu_app_secret.is_empty() {
            missing.push("FEISHU_APP_SECRET");
        }
        if self.feishu_verification_token.is_empty() {
            missing.push("FEISHU_VERIFICATION_TOKEN");
        }
        missing
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_keys();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TolanError::Config(missing.join(", ")))
        }
    }
}

fn default_feishu_api_base() -> String {
    "https://open.feishu.cn/open-apis".to_string()
}
fn default_bot_name() -> String {
    "群助手".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_small_model_timeout() -> u64 {
    30
}
fn default_image_model() -> String {
    "gemini-3-pro-image-preview".to_string()
}
fn default_image_max_size() -> u32 {
    1024
}
fn default_image_timeout() -> u64 {
    120
}
fn default_conversation_ttl() -> u64 {
    600
}
fn default_engage_threshold() -> f64 {
    0.65
}
fn default_thinking_delay() -> f64 {
    5.0
}
fn default_chat_logs_maxlen() -> usize {
    2000
}
fn default_recent_events_maxlen() -> usize {
    5000
}
fn default_max_context_messages() -> usize {
    20
}
fn default_max_summary_messages() -> usize {
    400
}
fn default_max_images_per_message() -> usize {
    4
}
fn default_searxng_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
