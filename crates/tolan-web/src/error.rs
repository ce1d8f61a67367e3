use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("no results")]
    Empty,
}

pub type Result<T> = std::result::Result<T, WebError>;
