pub mod client;
pub mod extract;
pub mod request;

pub use client::PopAiClient;
pub use request::{SendMessageRequest, flatten_messages, translate};
