pub mod chat;
pub mod client;
pub mod content;
pub mod error;
pub mod event;
pub mod mention;

pub use chat::ChatClient;
pub use client::FeishuClient;
pub use error::FeishuError;
