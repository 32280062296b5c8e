//! LLM client abstractions and implementations

pub mod client;
pub mod providers;

pub use client::{
    ChatOptions, FinishReason, FunctionDefinition, LlmClient, LlmResponse, ToolDefinition, Usage,
};
pub use providers::*;
