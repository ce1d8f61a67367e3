use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeishuError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tenant token error: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, FeishuError>;
