//! Resolved tool executor configuration

use super::types::{invalid, missing};
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.newrelic.com/graphql";
pub const DEFAULT_EXECUTOR_TIMEOUT_SECS: u64 = 30;

/// How tools are reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorBinding {
    /// An MCP server launched as a child process
    Subprocess { command: String, args: Vec<String> },
    /// HTTPS POST straight to the GraphQL endpoint
    Direct,
}

impl ExecutorBinding {
    /// `npx mcp-graphql`
    pub fn default_subprocess() -> Self {
        ExecutorBinding::Subprocess {
            command: "npx".to_string(),
            args: vec!["mcp-graphql".to_string()],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutorBinding::Subprocess { .. } => "subprocess",
            ExecutorBinding::Direct => "direct",
        }
    }
}

impl Default for ExecutorBinding {
    fn default() -> Self {
        Self::default_subprocess()
    }
}

/// Everything needed to reach the analytics API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedExecutorConfig {
    pub endpoint: String,
    pub api_key: String,
    pub account_id: String,
    #[serde(default)]
    pub allow_mutations: bool,
    #[serde(default = "default_executor_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub binding: ExecutorBinding,
}

fn default_executor_timeout() -> u64 {
    DEFAULT_EXECUTOR_TIMEOUT_SECS
}

impl ResolvedExecutorConfig {
    pub fn new<E, K, A>(endpoint: E, api_key: K, account_id: A) -> Self
    where
        E: Into<String>,
        K: Into<String>,
        A: Into<String>,
    {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            account_id: account_id.into(),
            allow_mutations: false,
            timeout_secs: DEFAULT_EXECUTOR_TIMEOUT_SECS,
            binding: ExecutorBinding::default(),
        }
    }

    pub fn with_binding(mut self, binding: ExecutorBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_allow_mutations(mut self, allow: bool) -> Self {
        self.allow_mutations = allow;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(missing("api_key"));
        }
        if self.account_id.is_empty() {
            return Err(missing("account_id"));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(invalid("endpoint", &self.endpoint));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "0"));
        }
        if let ExecutorBinding::Subprocess { command, .. } = &self.binding {
            if command.trim().is_empty() {
                return Err(missing("command"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolvedExecutorConfig::new(DEFAULT_ENDPOINT, "NRAK-1", "42");
        assert!(config.validate().is_ok());
        assert!(!config.allow_mutations);
        assert_eq!(config.binding, ExecutorBinding::default_subprocess());
        assert_eq!(config.timeout_secs, DEFAULT_EXECUTOR_TIMEOUT_SECS);
    }

    #[test]
    fn test_missing_account() {
        let config = ResolvedExecutorConfig::new(DEFAULT_ENDPOINT, "NRAK-1", "");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_command() {
        let config = ResolvedExecutorConfig::new(DEFAULT_ENDPOINT, "NRAK-1", "42").with_binding(
            ExecutorBinding::Subprocess {
                command: " ".into(),
                args: vec![],
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_binding_from_json() {
        let config: ResolvedExecutorConfig = serde_json::from_str(
            r#"{"endpoint": "https://api.eu.newrelic.com/graphql", "api_key": "k", "account_id": "1", "binding": {"kind": "direct"}}"#,
        )
        .unwrap();
        assert_eq!(config.binding, ExecutorBinding::Direct);
        assert_eq!(config.timeout_secs, 30);
    }
}
