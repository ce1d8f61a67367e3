pub mod client;
pub mod error;
pub mod intent;

pub use client::{ImageAttachment, LlmClient, LlmEndpoint};
pub use error::LlmError;
pub use intent::{classify_intent, should_use_web_search, IntentResult, TaskType};
