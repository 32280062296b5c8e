//! CLI output handler implementation

use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tytux_core::output::{OrchestratorEvent, OrchestratorOutput, OutputError};

/// Longest argument preview shown next to a tool name
const PREVIEW_LIMIT: usize = 80;

/// CLI output configuration
#[derive(Debug, Clone, Default)]
pub struct CliOutputConfig {
    /// Show round-trip and backend details
    pub debug: bool,
}

/// Spinner shared between a command and the output handler.
///
/// Lines printed while a spinner is active go above it instead of through it.
#[derive(Clone, Default)]
pub struct SpinnerSlot {
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl SpinnerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a spinner with the given message
    pub fn start(&self, message: &str) {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    /// Remove the spinner, if any
    pub fn stop(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }

    pub fn println(&self, line: impl AsRef<str>) {
        let active = self.bar.lock().ok().and_then(|slot| slot.clone());
        match active {
            Some(bar) => bar.println(line.as_ref()),
            None => eprintln!("{}", line.as_ref()),
        }
    }
}

/// CLI output handler that formats events for terminal display
pub struct CliOutputHandler {
    config: CliOutputConfig,
    spinner: SpinnerSlot,
}

impl CliOutputHandler {
    /// Create a new CLI output handler
    pub fn new(config: CliOutputConfig, spinner: SpinnerSlot) -> Self {
        Self { config, spinner }
    }

    fn render(&self, event: &OrchestratorEvent) -> Option<String> {
        match event {
            OrchestratorEvent::RoundTripStarted { round, temperature } if self.config.debug => {
                Some(
                    format!("· model call {} (temperature {:.1})", round + 1, temperature)
                        .dimmed()
                        .to_string(),
                )
            }
            OrchestratorEvent::RoundTripStarted { .. } => None,
            OrchestratorEvent::ToolInvoked { name, arguments } => {
                let preview = argument_preview(arguments);
                let line = if preview.is_empty() {
                    format!("⚙  {}", name.cyan().bold())
                } else {
                    format!("⚙  {} {}", name.cyan().bold(), preview.dimmed())
                };
                Some(line)
            }
            OrchestratorEvent::ToolCompleted {
                name,
                success,
                duration_ms,
            } => {
                let timing = format!("({}ms)", duration_ms).dimmed();
                if *success {
                    Some(format!("{} {} {}", "✓".green(), name, timing))
                } else {
                    Some(format!("{} {} {}", "✗".red(), name, timing))
                }
            }
            OrchestratorEvent::BackendFailed { message } if self.config.debug => {
                Some(format!("{} {}", "model call failed:".red().bold(), message))
            }
            OrchestratorEvent::BackendFailed { .. } => None,
            OrchestratorEvent::Truncated { round_trips } => Some(
                format!("⚠  stopped after {} tool round-trips", round_trips)
                    .yellow()
                    .to_string(),
            ),
        }
    }
}

#[async_trait]
impl OrchestratorOutput for CliOutputHandler {
    async fn emit_event(&self, event: OrchestratorEvent) -> Result<(), OutputError> {
        if let Some(line) = self.render(&event) {
            self.spinner.println(line);
        }
        Ok(())
    }
}

/// One-line summary of tool arguments. Queries are shown with whitespace collapsed.
fn argument_preview(arguments: &Map<String, Value>) -> String {
    let raw = match arguments.get("query").and_then(Value::as_str) {
        Some(query) => query.to_string(),
        None if arguments.is_empty() => return String::new(),
        None => Value::Object(arguments.clone()).to_string(),
    };

    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > PREVIEW_LIMIT {
        let truncated: String = collapsed.chars().take(PREVIEW_LIMIT).collect();
        format!("{}…", truncated)
    } else {
        collapsed
    }
}
