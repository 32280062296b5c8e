//! Orchestrator settings and builder

use super::core::Orchestrator;
use crate::config::{ExecutorBinding, ResolvedExecutorConfig, ResolvedLlmConfig};
use crate::error::{ConfigError, Result};
use crate::llm::{create_client, LlmClient};
use crate::output::{NullOutput, OrchestratorOutput};
use crate::tools::{
    graphql_tool_descriptors, GraphQlExecutor, McpExecutor, ToolCatalog, ToolDescriptor,
    ToolExecutor,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Tool round-trips allowed per turn
pub const MAX_ROUND_TRIPS: usize = 5;

/// Temperature of the first model call in a turn
pub const FIRST_CALL_TEMPERATURE: f32 = 0.0;

/// Temperature of every later model call in the same turn
pub const FOLLOW_UP_TEMPERATURE: f32 = 1.0;

/// Returned when the model gives nothing usable
pub const APOLOGY: &str = "I'm sorry, I couldn't generate a response. Please try again.";

/// Appended to the partial answer when the round-trip cap is hit
pub fn truncation_notice() -> String {
    format!(
        "(Stopped after {} tool round-trips to avoid an endless loop. The answer may be incomplete.)",
        MAX_ROUND_TRIPS
    )
}

/// The priming prompt used for a fresh conversation with an account
pub fn account_seed_prompt(account_id: &str) -> String {
    format!(
        "Use account ID {} for ongoing queries. Inspect the NerdGraph API schema when no query is provided.",
        account_id
    )
}

/// Per-orchestrator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Instruction sent ahead of every conversation
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Output cap for each model call
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Prompt answered once while building, before the first user turn
    #[serde(default)]
    pub seed_prompt: Option<String>,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_tokens".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        if let Some(seed) = &self.seed_prompt {
            if seed.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "seed_prompt".to_string(),
                    value: seed.clone(),
                }
                .into());
            }
        }

        Ok(())
    }
}

enum CatalogSource {
    Discover,
    Declared(Vec<ToolDescriptor>),
}

/// Builder that connects the pieces and primes the conversation
pub struct OrchestratorBuilder {
    llm_client: Arc<dyn LlmClient>,
    executor: Arc<dyn ToolExecutor>,
    config: OrchestratorConfig,
    output: Box<dyn OrchestratorOutput>,
    catalog: CatalogSource,
}

impl OrchestratorBuilder {
    /// Start from an existing client and executor. Tools are discovered from the executor.
    pub fn new(llm_client: Arc<dyn LlmClient>, executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            llm_client,
            executor,
            config: OrchestratorConfig::default(),
            output: Box::new(NullOutput),
            catalog: CatalogSource::Discover,
        }
    }

    /// Create the model client and launch the executor the configs describe
    pub async fn connect(
        llm_config: &ResolvedLlmConfig,
        executor_config: &ResolvedExecutorConfig,
    ) -> Result<Self> {
        executor_config.validate()?;
        let llm_client = create_client(llm_config)?;

        let builder = match &executor_config.binding {
            ExecutorBinding::Subprocess { .. } => {
                let executor = McpExecutor::launch(executor_config).await?;
                Self::new(llm_client, Arc::new(executor))
            }
            ExecutorBinding::Direct => {
                let executor = GraphQlExecutor::new(executor_config)?;
                Self::new(llm_client, Arc::new(executor))
                    .with_declared_tools(graphql_tool_descriptors())
            }
        };

        Ok(builder.with_max_tokens(llm_config.params.max_tokens))
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.config.system_prompt = system_prompt;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn with_seed_prompt(mut self, seed_prompt: Option<String>) -> Self {
        self.config.seed_prompt = seed_prompt;
        self
    }

    pub fn with_output(mut self, output: Box<dyn OrchestratorOutput>) -> Self {
        self.output = output;
        self
    }

    /// Use a static catalog instead of asking the executor
    pub fn with_declared_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.catalog = CatalogSource::Declared(tools);
        self
    }

    /// Build the orchestrator. The executor is shut down if any step fails.
    pub async fn build(self) -> Result<Orchestrator> {
        let executor = Arc::clone(&self.executor);

        match self.build_inner().await {
            Ok(orchestrator) => Ok(orchestrator),
            Err(err) => {
                if let Err(shutdown_err) = executor.shutdown().await {
                    warn!(%shutdown_err, "failed to release executor after setup error");
                }
                Err(err)
            }
        }
    }

    async fn build_inner(self) -> Result<Orchestrator> {
        self.config.validate()?;

        let catalog = match self.catalog {
            CatalogSource::Discover => ToolCatalog::discover(self.executor.as_ref()).await?,
            CatalogSource::Declared(tools) => ToolCatalog::declare(tools),
        };

        let seed = self.config.seed_prompt.clone();
        let mut orchestrator = Orchestrator::new(
            self.llm_client,
            self.executor,
            catalog,
            self.config,
            self.output,
        );

        if let Some(seed) = seed {
            let reply = orchestrator.prime(&seed).await?;
            if !reply.is_answered() {
                warn!(outcome = ?reply.outcome, "priming prompt did not produce an answer");
            }
        }

        Ok(orchestrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(OrchestratorConfig::default().validate().is_ok());

        let zero_tokens = OrchestratorConfig {
            max_tokens: Some(0),
            ..Default::default()
        };
        assert!(zero_tokens.validate().is_err());

        let blank_seed = OrchestratorConfig {
            seed_prompt: Some("  ".into()),
            ..Default::default()
        };
        assert!(blank_seed.validate().is_err());
    }

    #[test]
    fn test_account_seed_prompt() {
        assert_eq!(
            account_seed_prompt("1234567"),
            "Use account ID 1234567 for ongoing queries. Inspect the NerdGraph API schema when no query is provided."
        );
    }
}
