pub mod client;
pub mod pacer;
pub mod types;

pub use client::ChatClient;
pub use pacer::Pacer;
pub use types::{ChatMessage, ChatRequest, ChatResponse};
