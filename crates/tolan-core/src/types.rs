use serde::{Deserialize, Serialize};

/// Kind of chat a message arrived in. Feishu reports `group` or `p2p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Group,
    Direct,
}

impl ChatType {
    pub fn parse(s: &str) -> Self {
        match s {
            "group" => ChatType::Group,
            _ => ChatType::Direct,
        }
    }
}

/// Who sent the message. Anything that is not a human user is dropped by the
/// sender gate so the bot never talks to itself or to other apps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    User,
    App,
    System,
}

impl SenderKind {
    /// An absent sender_type is treated as a user — some envelope variants
    /// omit the field for ordinary messages.
    pub fn parse(s: &str) -> Self {
        match s {
            "" | "user" => SenderKind::User,
            "app" => SenderKind::App,
            _ => SenderKind::System,
        }
    }
}

/// One entry of a message's `mentions` array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mention {
    pub app_id: Option<String>,
    pub name: Option<String>,
}

/// Normalized inbound message event, produced by the Feishu envelope parser.
#[derive(Debug, Clone, Default)]
pub struct MessageEvent {
    pub chat_id: String,
    pub chat_type: Option<ChatType>,
    pub sender_id: String,
    pub sender_kind: Option<SenderKind>,
    pub message_id: String,
    pub parent_message_id: Option<String>,
    pub text: String,
    pub image_keys: Vec<String>,
    pub mentions: Vec<Mention>,
    pub msg_type: String,
}

impl MessageEvent {
    pub fn is_group(&self) -> bool {
        self.chat_type == Some(ChatType::Group)
    }
}

/// One line of recent chat context, in memory or persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentMessage {
    pub ts: String,
    pub user_id: String,
    pub text: String,
}

/// Per-chat reply mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Quiet,
    Normal,
    Active,
}

impl ChatMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quiet" => Some(ChatMode::Quiet),
            "normal" => Some(ChatMode::Normal),
            "active" => Some(ChatMode::Active),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Quiet => "quiet",
            ChatMode::Normal => "normal",
            ChatMode::Active => "active",
        }
    }
}

pub const DEFAULT_THRESHOLD: f64 = 0.65;

/// Per-chat settings row, persisted and cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub mode: ChatMode,
    pub threshold: f64,
    pub personality: String,
    pub language_style: String,
    pub response_length: String,
    pub last_mention_time: f64,
}

impl ChatSettings {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            mode: ChatMode::Normal,
            threshold: DEFAULT_THRESHOLD,
            personality: "chill".to_string(),
            language_style: "casual".to_string(),
            response_length: "normal".to_string(),
            last_mention_time: 0.0,
        }
    }
}
