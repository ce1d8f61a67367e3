use thiserror::Error;

#[derive(Debug, Error)]
pub enum TolanError {
    #[error("Configuration error: missing {0}")]
    Config(String),

    #[error("Verification token mismatch")]
    Unauthorized,

    #[error("Malformed event: {0}")]
    BadEvent(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, TolanError>;
