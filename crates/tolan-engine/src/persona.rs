//! Per-chat system prompts, selected from the personality settings.
//!
//! Stored values are validated on read; anything unexpected falls back to
//! the defaults so an old or hand-edited settings row can't break prompts.

use tolan_core::types::ChatSettings;

const VALID_PERSONALITIES: &[&str] = &["chill", "professional", "humorous"];
const VALID_STYLES: &[&str] = &["casual", "formal", "technical"];
const VALID_LENGTHS: &[&str] = &["brief", "normal", "detailed"];

fn personality_of(settings: &ChatSettings) -> &str {
    valid_or(&settings.personality, VALID_PERSONALITIES, "chill")
}

fn style_of(settings: &ChatSettings) -> &str {
    valid_or(&settings.language_style, VALID_STYLES, "casual")
}

fn length_of(settings: &ChatSettings) -> &str {
    valid_or(&settings.response_length, VALID_LENGTHS, "normal")
}

fn valid_or<'a>(value: &'a str, valid: &[&str], fallback: &'a str) -> &'a str {
    if valid.contains(&value) {
        value
    } else {
        fallback
    }
}

fn personality_desc(personality: &str) -> &'static str {
    match personality {
        "professional" => "你是一个专业、严谨的群聊助手，说话清晰有条理，注重准确性。",
        "humorous" => "你是一个幽默、有趣的群聊助手，说话风趣，适当加入一些轻松的语气。",
        _ => "你是一个放松、友好的群聊助手，说话自然随意，像朋友一样聊天。",
    }
}

fn style_desc(style: &str) -> &'static str {
    match style {
        "formal" => "使用正式、规范的表达方式，保持专业态度。",
        "technical" => "使用技术术语和专业表达，面向技术人员。",
        _ => "使用口语化、自然的表达方式，避免生硬的术语。",
    }
}

fn length_desc(length: &str) -> &'static str {
    match length {
        "brief" => "回复要简洁，最多 2-3 句话，直奔主题。",
        "detailed" => "回复可以详细，3-5 句话或更多，提供充分的背景和建议。",
        _ => "回复适度，2-4 句话，包含必要的解释。",
    }
}

/// System prompt for answering addressed messages.
pub(crate) fn system_prompt(settings: &ChatSettings) -> String {
    format!(
        "你叫托兰，是群聊助手，同时也是群里的一员。{}\n\n\
         说话要求：\n\
         - {}\n\
         - {}\n\
         - 不要自夸、推销或过度寒暄\n\
         - 不要说\"如果你需要我还能...\"这类话\n\
         - 有图片就结合图片和文字给出具体建议\n\
         - 平铺直叙地组织内容，而不是markdown格式",
        personality_desc(personality_of(settings)),
        style_desc(style_of(settings)),
        length_desc(length_of(settings)),
    )
}

/// System prompt for proactive replies — tighter than the answer prompt.
pub(crate) fn proactive_system_prompt(settings: &ChatSettings) -> String {
    format!(
        "你叫托兰，是群聊助手，同时也是群里的一员。{}\n\n\
         回复要求：\n\
         - {}\n\
         - 简洁有力，1-2 句话就够了\n\
         - 只说核心见解或下一步建议\n\
         - 不要客套、自夸或推销\n\
         - 自然地融入群聊对话，不要显得生硬",
        personality_desc(personality_of(settings)),
        style_desc(style_of(settings)),
    )
}

pub(crate) fn summary_system_prompt() -> &'static str {
    "你叫托兰，是擅长做会议/群聊总结的助理，同时也是群里的一员。\n\n\
     总结要求：\n\
     - 客观、条理清晰\n\
     - 突出主题、关键决定、待办事项\n\
     - 包含参考链接或原话片段\n\
     - 避免过度冗长，重点突出"
}

pub(crate) fn welcome_system_prompt(settings: &ChatSettings) -> String {
    let tone = match personality_of(settings) {
        "professional" => "专业、正式的语气",
        "humorous" => "幽默、有趣的语气",
        _ => "友好、热情、放松的语气",
    };
    format!(
        "你叫托兰，是友好的群聊助手，擅长写欢迎语。\n\n\
         欢迎语要求：\n\
         - 使用{tone}\n\
         - 40-80 字左右\n\
         - 附上过去两周群里讨论的主题关键词\n\
         - 给出一个开场建议或问题\n\
         - 让新成员感到被欢迎"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_settings_fall_back_to_defaults() {
        let mut settings = ChatSettings::default();
        settings.personality = "grumpy".into();
        settings.language_style = "emoji".into();
        settings.response_length = "epic".into();
        let prompt = system_prompt(&settings);
        assert!(prompt.contains("放松、友好"));
        assert!(prompt.contains("口语化"));
        assert!(prompt.contains("2-4 句话"));
    }

    #[test]
    fn personalities_change_the_prompt() {
        let mut settings = ChatSettings::default();
        settings.personality = "humorous".into();
        assert!(system_prompt(&settings).contains("幽默"));
        settings.personality = "professional".into();
        assert!(system_prompt(&settings).contains("专业、严谨"));
        assert!(welcome_system_prompt(&settings).contains("专业、正式"));
    }
}
