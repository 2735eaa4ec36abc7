//! LLM integration module.
//!
//! Provides an OpenAI-compatible client used for answer generation and
//! judging, plus the prompts both roles use.

mod client;
mod prompts;

pub(crate) use client::ApiError;
pub use client::{ChatModel, LlmClient, LlmResponse, Message, Role, TokenUsage};
pub use prompts::Prompts;
