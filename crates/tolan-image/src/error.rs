use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image model not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("no image data in response: {0}")]
    NoImage(String),

    #[error("decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, ImageError>;
