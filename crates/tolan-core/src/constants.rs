//! Prompts, user-visible strings and tuning constants.

// Prompt templates
pub const PROMPT_TEMPLATE_CHAT: &str = "群上下文：\n{context}\n\n用户问题：{question}\n请用简短要点直接回答。";

pub const PROMPT_TEMPLATE_PROACTIVE: &str =
    "群上下文：\n{context}\n\n有人说：{text}\n请做出回应，说话像人类、直接、不啰嗦。不要自夸/推销/寒暄。";

pub const PROMPT_TEMPLATE_SUMMARY: &str = "请对以下群聊做{period}总结：\n\
     - 输出：主题Top N、关键结论/决定、待办与负责人。\n\
     - 语气客观，条理清晰。\n\n片段：\n{messages}";

pub const PROMPT_TEMPLATE_WELCOME: &str = "为新成员写一段40~80字的欢迎语，\
     并附上过去两周群里讨论的主题关键词与一个开场建议。\n上下文示例：\n{context}";

pub const PROMPT_TEMPLATE_IMAGE_GEN: &str =
    "根据用户需求生成图片。\n\n用户需求: {prompt}\n\n请生成符合要求的图片。";

pub const PROMPT_TEMPLATE_IMAGE_TO_IMAGE: &str = "根据参考图片和用户需求生成新图片。\n\n\
     参考图片已提供。\n用户需求: {prompt}\n\n请基于参考图片生成符合要求的新图片。";

// Command help text
pub const HELP_TEXT: &str = "可用命令：\n\
     /summary weekly|monthly - 生成群总结\n\
     /settings threshold <0~1> - 调整主动发言阈值（0=总是回复，1=从不回复）\n\
     /settings mode quiet|normal|active - 调整发言模式\n\
     \x20 - quiet: 仅在被@时回复\n\
     \x20 - normal: 默认模式，根据阈值自动回复\n\
     \x20 - active: 更积极地自动回复\n\
     /settings personality chill|professional|humorous - 调整性格\n\
     /optout - 个人选择不纳入公开个人总结\n\
     /reset - 重置 Bot 状态（清空会话、重置设置）\n\
     \n💡 提示：如不想自动回复，使用 /settings mode quiet";

// Reply strings
pub const MSG_THINKING: &str = "让我想想……";
pub const MSG_ZIP_REPLY: &str = "🤐";
pub const MSG_THRESHOLD_ERROR: &str = "阈值需为0~1数字，例如 /settings threshold 0.65";
pub const MSG_SETTINGS_UNKNOWN: &str = "未识别的设置项。";
pub const MSG_OPTOUT_CONFIRMED: &str = "已记录；后续公共总结将不展示你的个人条目。";
pub const MSG_RESET_DONE: &str = "已重置 Bot 状态：\n\
     - 清空会话记录\n\
     - 重置主动发言阈值为 0.65\n\
     - 重置发言模式为 normal\n\
     - 忘记所有之前的对话上下文";
pub const MSG_WELCOME_SUFFIX: &str = "\n可使用 /help 查看指令。";
pub const MSG_LLM_UNAVAILABLE: &str = "我这边出了点问题，稍后再试试。";

// Drawing
pub const MSG_DRAWING: &str = "正在绘制中，请稍候...";
pub const MSG_DRAW_SUCCESS: &str = "图片已生成！";
pub const MSG_DRAW_ERROR: &str = "绘图失败，请稍后重试";
pub const MSG_DRAW_NO_CONFIG: &str = "绘图功能未配置，请联系管理员设置 IMAGE_MODEL 相关配置";
pub const MSG_UPLOAD_FAILED: &str = "图片上传失败，请稍后重试";

// Proactive-engage trigger keywords
pub const ENGAGE_KEYWORDS: &[&str] = &[
    "怎么", "如何", "为啥", "为什么", "怎么办", "谁知道", "有链接吗", "总结", "结论", "进展",
    "?", "？",
];

// Phrases that mean "be quiet"
pub const ZIP_KEYWORDS: &[&str] = &[
    "啥都不用做", "你呆着就好", "别说话", "闭嘴", "安静点", "不用回", "不用回复", "不需要你",
];

// Phrases that decline an attached image as drawing reference
pub const NO_REFERENCE_KEYWORDS: &[&str] = &["不用参考", "不参考", "忽略图片", "不基于", "独立创作"];

// Time-sensitive markers in the classifier's reasoning that suggest a search
pub const SEARCH_INDICATORS: &[&str] = &[
    "最新", "实时", "当前", "现在", "今天", "最近", "查询", "了解", "是什么", "怎么样", "有哪些",
    "latest", "current", "today", "recent", "what is", "how",
];

// Per-purpose model temperatures
pub const TEMPERATURE_CHAT: f64 = 0.2;
pub const TEMPERATURE_PROACTIVE: f64 = 0.3;
pub const TEMPERATURE_SUMMARY: f64 = 0.3;
pub const TEMPERATURE_WELCOME: f64 = 0.5;
pub const TEMPERATURE_INTENT: f64 = 0.1;

pub const TIME_FORMAT_MESSAGE: &str = "%m-%d %H:%M";

/// Aspect-ratio tokens the image model accepts.
pub const SUPPORTED_ASPECT_RATIOS: &[(u32, u32)] = &[
    (1, 1),
    (2, 3),
    (3, 2),
    (3, 4),
    (4, 3),
    (4, 5),
    (5, 4),
    (9, 16),
    (16, 9),
    (21, 9),
];

/// Named output-size presets, keyed by keyword in the prompt.
pub const IMAGE_SIZE_PRESETS: &[(&str, (u32, u32))] = &[
    ("square", (1024, 1024)),
    ("landscape", (1024, 768)),
    ("portrait", (768, 1024)),
    ("wide", (1024, 576)),
    ("tall", (576, 1024)),
];

pub fn size_preset(name: &str) -> (u32, u32) {
    IMAGE_SIZE_PRESETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, s)| *s)
        .unwrap_or((1024, 1024))
}
