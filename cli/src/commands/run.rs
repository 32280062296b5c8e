//! Single question command

use super::connect;
use crate::config::CliConfigLoader;
use crate::output::SpinnerSlot;
use anyhow::{bail, Result};
use tracing::{info, warn};
use tytux_core::ReplyOutcome;

/// Answer one question and exit
pub async fn run_command(question: String, config_loader: CliConfigLoader, debug: bool) -> Result<()> {
    let loaded = config_loader.load().await?;
    let spinner = SpinnerSlot::new();
    let mut orchestrator = connect(&loaded, &spinner, debug).await?;

    spinner.start("Thinking...");
    let result = orchestrator.respond(&question).await;
    spinner.stop();

    if let Err(e) = orchestrator.shutdown().await {
        warn!("Failed to stop the executor: {}", e);
    }

    let reply = result?;
    info!(
        round_trips = reply.round_trips,
        duration_ms = reply.duration_ms,
        "question answered"
    );

    if let ReplyOutcome::BackendFailure(_) = reply.outcome {
        bail!("{}", reply.text);
    }

    println!("{}", reply.text);
    Ok(())
}
