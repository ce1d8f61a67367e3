use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM endpoint not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Permanent (4xx) provider failures log at ERROR, everything else WARN.
    pub fn is_permanent(&self) -> bool {
        matches!(self, LlmError::Api { status, .. } if (400..500).contains(status))
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
