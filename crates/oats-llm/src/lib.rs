//! oats-llm: completion oracle clients
//!
//! The reasoning engine treats the language model as an opaque
//! request/response oracle. This crate provides the provider trait, the
//! Anthropic and OpenAI implementations, and the retrying client the
//! engine actually talks to.

pub mod anthropic;
pub mod openai;
pub mod oracle;
pub mod provider;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use oracle::{Oracle, OracleClient, RetryConfig};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmError, LlmProvider, ProviderType,
    TokenUsage,
};
