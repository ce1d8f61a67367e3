pub mod error;
pub mod fetch;
pub mod search;

pub use error::WebError;
pub use fetch::{extract_urls, fetch_webpage, WebFetcher};
pub use search::SearchClient;
