//! Hosted model provider (OpenAI-compatible API)

pub mod chat;
pub mod client;

pub use chat::{AnswerGenerator, OpenAiChat};
pub use client::OpenAiClient;
