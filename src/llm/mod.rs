//! LLM integration module.
//!
//! Provides an OpenAI-compatible client for completions and embeddings, and
//! the prompts used by the relevance judge.

mod client;
mod prompts;

pub use client::{LlmClient, LlmResponse, Message, Role};
pub use prompts::Prompts;
