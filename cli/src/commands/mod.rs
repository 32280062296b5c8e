//! CLI command implementations

pub mod check_env;
pub mod interactive;
pub mod run;
pub mod tools;

pub use check_env::check_env_command;
pub use interactive::interactive_command;
pub use run::run_command;
pub use tools::tools_command;

use crate::config::LoadedConfig;
use crate::output::{CliOutputConfig, CliOutputHandler, SpinnerSlot};
use anyhow::{Context, Result};
use tracing::debug;
use tytux_core::orchestrator::account_seed_prompt;
use tytux_core::{Orchestrator, OrchestratorBuilder};

/// Launch the executor, discover tools and prime the conversation with the account
pub async fn connect(loaded: &LoadedConfig, spinner: &SpinnerSlot, debug: bool) -> Result<Orchestrator> {
    debug!(
        protocol = %loaded.llm.protocol,
        model = %loaded.llm.model,
        binding = loaded.executor.binding.name(),
        "connecting"
    );

    spinner.start("Connecting to the analytics API...");
    let result = build_orchestrator(loaded, spinner, debug).await;
    spinner.stop();

    result.context("Failed to start the conversation")
}

async fn build_orchestrator(
    loaded: &LoadedConfig,
    spinner: &SpinnerSlot,
    debug: bool,
) -> tytux_core::Result<Orchestrator> {
    let output = CliOutputHandler::new(CliOutputConfig { debug }, spinner.clone());

    OrchestratorBuilder::connect(&loaded.llm, &loaded.executor)
        .await?
        .with_system_prompt(loaded.system_prompt.clone())
        .with_seed_prompt(Some(account_seed_prompt(&loaded.executor.account_id)))
        .with_output(Box::new(output))
        .build()
        .await
}
