//! Bot-mention detection — three stages, any match wins.

use tracing::debug;

use tolan_core::types::MessageEvent;

/// True when the message addresses the bot:
/// (a) a mention whose app_id matches the configured bot app id,
/// (b) a mention whose name equals the bot display name exactly,
/// (c) the literal `@<bot-name>` substring in the text.
pub fn mentioned_bot(event: &MessageEvent, bot_app_id: &str, bot_name: &str) -> bool {
    if !bot_app_id.is_empty() {
        for mention in &event.mentions {
            if mention.app_id.as_deref() == Some(bot_app_id) {
                debug!("mentioned_bot by app_id");
                return true;
            }
        }
    }

    for mention in &event.mentions {
        if let Some(name) = mention.name.as_deref() {
            let name = name.trim();
            if !name.is_empty() && name == bot_name {
                debug!(bot_name, "mentioned_bot by name");
                return true;
            }
        }
    }

    if !bot_name.is_empty() && event.text.contains(&format!("@{bot_name}")) {
        debug!(bot_name, "mentioned_bot by text");
        return true;
    }
    false
}

/// The message mentions someone, but not the bot — a side conversation the
/// bot must not insert itself into.
pub fn mentions_someone_else(event: &MessageEvent, bot_app_id: &str, bot_name: &str) -> bool {
    !event.mentions.is_empty() && !mentioned_bot(event, bot_app_id, bot_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tolan_core::types::Mention;

    fn event_with(text: &str, mentions: Vec<Mention>) -> MessageEvent {
        MessageEvent {
            text: text.to_string(),
            mentions,
            ..Default::default()
        }
    }

    #[test]
    fn app_id_match_wins() {
        let event = event_with(
            "hello",
            vec![Mention {
                app_id: Some("cli_bot".into()),
                name: Some("别名".into()),
            }],
        );
        assert!(mentioned_bot(&event, "cli_bot", "群助手"));
    }

    #[test]
    fn name_match_is_exact() {
        let event = event_with(
            "hello",
            vec![Mention {
                app_id: None,
                name: Some("群助手".into()),
            }],
        );
        assert!(mentioned_bot(&event, "cli_bot", "群助手"));

        let near_miss = event_with(
            "hello",
            vec![Mention {
                app_id: None,
                name: Some("群助手2".into()),
            }],
        );
        assert!(!mentioned_bot(&near_miss, "cli_bot", "群助手"));
    }

    #[test]
    fn text_substring_is_the_last_resort() {
        let event = event_with("@群助手 帮个忙", vec![]);
        assert!(mentioned_bot(&event, "cli_bot", "群助手"));

        let plain = event_with("帮个忙", vec![]);
        assert!(!mentioned_bot(&plain, "cli_bot", "群助手"));
    }

    #[test]
    fn someone_else_requires_mentions_without_bot() {
        let other = event_with(
            "@张三 看一下",
            vec![Mention {
                app_id: None,
                name: Some("张三".into()),
            }],
        );
        assert!(mentions_someone_else(&other, "cli_bot", "群助手"));

        let bot = event_with(
            "@群助手 看一下",
            vec![Mention {
                app_id: Some("cli_bot".into()),
                name: None,
            }],
        );
        assert!(!mentions_someone_else(&bot, "cli_bot", "群助手"));

        let nobody = event_with("都来看一下", vec![]);
        assert!(!mentions_someone_else(&nobody, "cli_bot", "群助手"));
    }
}
