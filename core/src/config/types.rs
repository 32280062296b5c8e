//! Resolved model backend configuration
//!
//! Core only accepts fully resolved, validated configuration.
//! All discovery, loading, and merging happens in the CLI layer.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default HTTP timeout for model calls
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Supported model backend protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Google AI API (Gemini)
    #[serde(rename = "google_ai")]
    GoogleAI,
    /// OpenAI-compatible API (includes OpenAI, many proxies, local models)
    #[serde(rename = "openai_compat")]
    OpenAICompat,
    /// Azure OpenAI API
    #[serde(rename = "azure_openai")]
    AzureOpenAI,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::GoogleAI => "google_ai",
            Protocol::OpenAICompat => "openai_compat",
            Protocol::AzureOpenAI => "azure_openai",
        }
    }

    /// Parse the names accepted on the command line and in config files
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "google_ai" | "googleai" | "google" | "gemini" => Some(Protocol::GoogleAI),
            "openai_compat" | "openai" => Some(Protocol::OpenAICompat),
            "azure_openai" | "azure" => Some(Protocol::AzureOpenAI),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Protocol::GoogleAI => Some("https://generativelanguage.googleapis.com/v1beta"),
            Protocol::OpenAICompat => Some("https://api.openai.com/v1"),
            Protocol::AzureOpenAI => None, // Requires custom endpoint
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Protocol::GoogleAI => "gemini-2.0-flash",
            Protocol::OpenAICompat | Protocol::AzureOpenAI => "gpt-4o-mini",
        }
    }

    /// Environment variable that conventionally holds the key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Protocol::GoogleAI => "GEMINI_API_KEY",
            Protocol::OpenAICompat => "OPENAI_API_KEY",
            Protocol::AzureOpenAI => "AZURE_OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model parameters for LLM requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Top-p sampling parameter
    pub top_p: Option<f32>,
    /// Top-k sampling parameter (for compatible models)
    pub top_k: Option<u32>,
    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
}

/// A fully resolved LLM configuration ready for use by core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLlmConfig {
    pub protocol: Protocol,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers for requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Whole-request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_timeout() -> u64 {
    DEFAULT_LLM_TIMEOUT_SECS
}

impl ResolvedLlmConfig {
    pub fn new(protocol: Protocol, base_url: String, api_key: String, model: String) -> Self {
        Self {
            protocol,
            base_url,
            api_key,
            model,
            params: ModelParams::default(),
            headers: HashMap::new(),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(missing("api_key"));
        }

        if self.model.is_empty() {
            return Err(missing("model"));
        }

        if self.base_url.is_empty() {
            return Err(missing("base_url"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(invalid("base_url", &self.base_url));
        }

        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "0"));
        }

        if let Some(top_p) = self.params.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(invalid("top_p", &top_p.to_string()));
            }
        }

        Ok(())
    }
}

pub(crate) fn missing(field: &str) -> crate::error::Error {
    ConfigError::MissingField {
        field: field.to_string(),
    }
    .into()
}

pub(crate) fn invalid(field: &str, value: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}
