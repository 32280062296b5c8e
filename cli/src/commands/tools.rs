//! Tools listing command

use crate::config::CliConfigLoader;
use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{info, warn};
use tytux_core::tools::{
    graphql_tool_descriptors, GraphQlExecutor, McpExecutor, ToolCatalog, ToolExecutor,
};
use tytux_core::ExecutorBinding;

/// Connect to the executor and print its catalog
pub async fn tools_command(config_loader: CliConfigLoader) -> Result<()> {
    let config = config_loader.load_executor().await?;
    info!(binding = config.binding.name(), "Listing available tools");

    let catalog = match &config.binding {
        ExecutorBinding::Subprocess { .. } => {
            let executor = McpExecutor::launch(&config)
                .await
                .context("Failed to launch the MCP server")?;
            let catalog = ToolCatalog::discover(&executor).await;
            if let Err(e) = executor.shutdown().await {
                warn!("Failed to stop the MCP server: {}", e);
            }
            catalog?
        }
        ExecutorBinding::Direct => {
            // Validates the config; the direct binding has a fixed catalog
            GraphQlExecutor::new(&config)?;
            ToolCatalog::declare(graphql_tool_descriptors())
        }
    };

    println!("🛠️  Available Tools ({} via {})\n", catalog.len(), config.binding.name());

    for tool in catalog.iter() {
        println!("📦 {}", tool.name.bold());
        let first_line = tool.description.lines().next().unwrap_or_default();
        if !first_line.is_empty() {
            println!("   {}", first_line);
        }
        println!();
    }

    Ok(())
}
