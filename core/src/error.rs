//! Error types and handling for TyTuX Core

use thiserror::Error;

/// Result type alias for TyTuX operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for TyTuX Core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Model backend errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool executor errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Conversation store and caller input errors
    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    /// Tool catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },
}

/// Model backend errors. Any of these ends the current turn.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Malformed response: {message}")]
    InvalidResponse { message: String },
}

/// Tool executor errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool execution failed: {name} - {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("Invalid tool parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Tool timeout: {name}")]
    Timeout { name: String },

    #[error("The {binding} binding does not support tool discovery")]
    DiscoveryUnsupported { binding: String },
}

/// Conversation store and caller input errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Invalid turn sequence: {reason}")]
    InvalidSequence { reason: String },
}

/// Tool catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Tool catalog unavailable from {binding} executor: {message}")]
    Unavailable { binding: String, message: String },
}

impl Error {
    /// Whether this is the caller-input error raised for blank prompts
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Error::Conversation(ConversationError::EmptyInput))
    }
}
