//! Slash-command parsing and handlers.
//!
//! Only recognized commands parse; anything else starting with `/` falls
//! through to the normal addressing flow, so a stray "/shrug" still gets the
//! mention treatment.

use tracing::{info, warn};

use tolan_core::constants::{
    HELP_TEXT, MSG_OPTOUT_CONFIRMED, MSG_RESET_DONE, MSG_SETTINGS_UNKNOWN, MSG_THRESHOLD_ERROR,
};
use tolan_core::types::{ChatMode, DEFAULT_THRESHOLD};

use crate::engine::Engine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    Summary { period: String },
    Settings { key: String, value: String },
    Optout,
    Reset,
}

/// Parse a recognized command from `text`. Returns `None` for non-commands
/// and for unknown or incomplete command forms.
pub(crate) fn parse_command(text: &str) -> Option<Command> {
    if !text.starts_with('/') {
        return None;
    }
    let mut parts = text.split_whitespace();
    let head = parts.next()?.to_lowercase();
    let args: Vec<&str> = parts.collect();

    match head.as_str() {
        "/help" => Some(Command::Help),
        "/summary" => {
            let period = match args.first().map(|p| p.to_lowercase()) {
                Some(p) if p == "monthly" => "monthly",
                _ => "weekly",
            };
            Some(Command::Summary {
                period: period.to_string(),
            })
        }
        "/settings" if args.len() >= 2 => Some(Command::Settings {
            key: args[0].to_lowercase(),
            value: args[1].to_lowercase(),
        }),
        "/optout" => Some(Command::Optout),
        "/reset" => Some(Command::Reset),
        _ => None,
    }
}

impl Engine {
    pub(crate) async fn handle_command(&self, chat_id: &str, user_id: &str, command: Command) {
        match command {
            Command::Help => {
                info!(chat_id, "/help");
                self.chat.send_text(chat_id, HELP_TEXT).await;
            }
            Command::Summary { period } => {
                info!(chat_id, period = %period, "/summary");
                self.summarize_chat(chat_id, &period).await;
            }
            Command::Settings { key, value } => {
                self.handle_settings(chat_id, &key, &value).await;
            }
            Command::Optout => {
                info!(chat_id, user_id, "/optout");
                self.chat.send_text(chat_id, MSG_OPTOUT_CONFIRMED).await;
            }
            Command::Reset => {
                info!(chat_id, "/reset");
                self.state.clear_messages(chat_id);
                self.state.clear_conversation(chat_id);
                if let Some(store) = &self.store {
                    if let Err(e) = store.set_threshold(chat_id, DEFAULT_THRESHOLD) {
                        warn!(chat_id, error = %e, "reset threshold failed");
                    }
                    if let Err(e) = store.set_mode(chat_id, ChatMode::Normal) {
                        warn!(chat_id, error = %e, "reset mode failed");
                    }
                }
                self.chat.send_text(chat_id, MSG_RESET_DONE).await;
            }
        }
    }

    async fn handle_settings(&self, chat_id: &str, key: &str, value: &str) {
        match key {
            "threshold" => match value.parse::<f64>() {
                Ok(raw) => {
                    let clamped = raw.clamp(0.0, 1.0);
                    if let Some(store) = &self.store {
                        if let Err(e) = store.set_threshold(chat_id, clamped) {
                            warn!(chat_id, error = %e, "threshold update failed");
                        }
                    }
                    info!(chat_id, threshold = clamped, "/settings threshold");
                    self.chat
                        .send_text(chat_id, &format!("已将主动发言阈值设置为 {clamped}"))
                        .await;
                }
                Err(_) => {
                    warn!(chat_id, value, "/settings threshold parse error");
                    self.chat.send_text(chat_id, MSG_THRESHOLD_ERROR).await;
                }
            },
            "mode" => match ChatMode::parse(value) {
                Some(mode) => {
                    if let Some(store) = &self.store {
                        if let Err(e) = store.set_mode(chat_id, mode) {
                            warn!(chat_id, error = %e, "mode update failed");
                        }
                    }
                    info!(chat_id, mode = mode.as_str(), "/settings mode");
                    self.chat
                        .send_text(chat_id, &format!("已切换模式为 {}", mode.as_str()))
                        .await;
                }
                None => {
                    warn!(chat_id, value, "/settings mode invalid");
                    self.chat.send_text(chat_id, MSG_SETTINGS_UNKNOWN).await;
                }
            },
            "personality" if ["chill", "professional", "humorous"].contains(&value) => {
                if let Some(store) = &self.store {
                    if let Err(e) = store.set_personality(chat_id, value) {
                        warn!(chat_id, error = %e, "personality update failed");
                    }
                }
                self.chat
                    .send_text(chat_id, &format!("已切换性格为 {value}"))
                    .await;
            }
            "style" if ["casual", "formal", "technical"].contains(&value) => {
                if let Some(store) = &self.store {
                    if let Err(e) = store.set_language_style(chat_id, value) {
                        warn!(chat_id, error = %e, "language style update failed");
                    }
                }
                self.chat
                    .send_text(chat_id, &format!("已切换语言风格为 {value}"))
                    .await;
            }
            "length" if ["brief", "normal", "detailed"].contains(&value) => {
                if let Some(store) = &self.store {
                    if let Err(e) = store.set_response_length(chat_id, value) {
                        warn!(chat_id, error = %e, "response length update failed");
                    }
                }
                self.chat
                    .send_text(chat_id, &format!("已切换回复长度为 {value}"))
                    .await;
            }
            _ => {
                warn!(chat_id, key, value, "/settings unknown key or value");
                self.chat.send_text(chat_id, MSG_SETTINGS_UNKNOWN).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_parse() {
        assert_eq!(parse_command("/help"), Some(Command::Help));
        assert_eq!(parse_command("/optout"), Some(Command::Optout));
        assert_eq!(parse_command("/reset"), Some(Command::Reset));
    }

    #[test]
    fn summary_period_defaults_to_weekly() {
        assert_eq!(
            parse_command("/summary"),
            Some(Command::Summary {
                period: "weekly".into()
            })
        );
        assert_eq!(
            parse_command("/summary monthly"),
            Some(Command::Summary {
                period: "monthly".into()
            })
        );
        assert_eq!(
            parse_command("/summary daily"),
            Some(Command::Summary {
                period: "weekly".into()
            })
        );
    }

    #[test]
    fn settings_requires_key_and_value() {
        assert_eq!(
            parse_command("/settings threshold 0.8"),
            Some(Command::Settings {
                key: "threshold".into(),
                value: "0.8".into()
            })
        );
        assert_eq!(parse_command("/settings"), None);
        assert_eq!(parse_command("/settings mode"), None);
    }

    #[test]
    fn case_is_normalized() {
        assert_eq!(parse_command("/HELP"), Some(Command::Help));
        assert_eq!(
            parse_command("/Settings MODE Quiet"),
            Some(Command::Settings {
                key: "mode".into(),
                value: "quiet".into()
            })
        );
    }

    #[test]
    fn unknown_commands_fall_through() {
        assert_eq!(parse_command("/shrug"), None);
        assert_eq!(parse_command("not a command"), None);
    }
}
