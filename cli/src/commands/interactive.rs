//! Interactive mode command

use super::connect;
use crate::config::CliConfigLoader;
use crate::output::SpinnerSlot;
use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use tytux_core::orchestrator::account_seed_prompt;
use tytux_core::{Reply, ReplyOutcome};

/// Read-eval loop over stdin
pub async fn interactive_command(config_loader: CliConfigLoader, debug: bool) -> Result<()> {
    let loaded = config_loader.load().await?;
    let spinner = SpinnerSlot::new();
    let mut orchestrator = connect(&loaded, &spinner, debug).await?;
    let seed = account_seed_prompt(&loaded.executor.account_id);

    println!("{}", "TyTuX - Command your data".bold());
    println!(
        "{}",
        format!(
            "Model {} · account {} · {} tools. Type 'clear' to start over, 'quit' to leave.",
            orchestrator.model_name(),
            loaded.executor.account_id,
            orchestrator.catalog().len()
        )
        .dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", "you ›".green().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "clear" => {
                orchestrator.reset(Some(seed.as_str()));
                println!("{}", "Conversation cleared.".dimmed());
                continue;
            }
            _ => {}
        }

        spinner.start("Thinking...");
        let outcome = tokio::select! {
            reply = orchestrator.respond(input) => Some(reply),
            _ = tokio::signal::ctrl_c() => None,
        };
        spinner.stop();

        match outcome {
            Some(Ok(reply)) => print_reply(&reply, debug),
            Some(Err(e)) => eprintln!("{} {}", "error:".red().bold(), e),
            None => {
                debug!("request cancelled by user");
                println!("{}", "Request cancelled.".yellow());
            }
        }
    }

    if let Err(e) = orchestrator.shutdown().await {
        warn!("Failed to stop the executor: {}", e);
    }

    Ok(())
}

fn print_reply(reply: &Reply, debug: bool) {
    let label = "tytux ›".cyan().bold();
    match reply.outcome {
        ReplyOutcome::BackendFailure(_) => println!("{} {}", label, reply.text.red()),
        _ => println!("{} {}", label, reply.text),
    }

    if debug {
        println!(
            "{}",
            format!(
                "[{:?} · {} round-trips · {}ms]",
                reply.outcome, reply.round_trips, reply.duration_ms
            )
            .dimmed()
        );
    }
}
