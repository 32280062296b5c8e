//! # TyTuX Core
//!
//! Core library for TyTuX - converse with a GraphQL analytics API through an LLM.
//!
//! A user message goes to a model together with a catalog of tools. When the model
//! asks for tools, they run through an executor (an MCP subprocess or direct HTTP)
//! and the results are fed back until the model answers in text.

// Core modules
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod output;
pub mod session;
pub mod tools;

// Re-export commonly used types
pub use config::{ExecutorBinding, ModelParams, Protocol, ResolvedExecutorConfig, ResolvedLlmConfig};
pub use conversation::{Conversation, Role, ToolInvocation, ToolOutcome, ToolResult, Turn};
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig, Reply, ReplyOutcome};
pub use session::{ChatSurface, SessionRegistry, SharedConversation};

/// Current version of the tytux-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the library
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a specific debug mode
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}
