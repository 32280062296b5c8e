//! Model backend implementations

pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use super::LlmClient;
use crate::config::{Protocol, ResolvedLlmConfig};
use crate::error::Result;
use std::sync::Arc;

/// Build the client matching the configured protocol
pub fn create_client(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>> {
    config.validate()?;

    let client: Arc<dyn LlmClient> = match config.protocol {
        Protocol::GoogleAI => Arc::new(GeminiClient::new(config)?),
        Protocol::OpenAICompat => Arc::new(OpenAiClient::new(config)?),
        Protocol::AzureOpenAI => Arc::new(OpenAiClient::azure(config)?),
    };
    Ok(client)
}
