//! Orchestrator events and the output trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error type returned by output handlers
pub type OutputError = Box<dyn std::error::Error + Send + Sync>;

/// Things worth telling a user while a turn is in flight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// A model call is about to be made
    RoundTripStarted { round: usize, temperature: f32 },

    /// A tool is about to run
    ToolInvoked {
        name: String,
        arguments: Map<String, Value>,
    },

    /// A tool finished
    ToolCompleted {
        name: String,
        success: bool,
        duration_ms: u64,
    },

    /// The model backend failed; the turn ends
    BackendFailed { message: String },

    /// The round-trip cap was hit while the model still wanted tools
    Truncated { round_trips: usize },
}

/// Sink for orchestrator events
#[async_trait]
pub trait OrchestratorOutput: Send + Sync {
    async fn emit_event(&self, event: OrchestratorEvent) -> Result<(), OutputError>;
}

/// Output that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

#[async_trait]
impl OrchestratorOutput for NullOutput {
    async fn emit_event(&self, _event: OrchestratorEvent) -> Result<(), OutputError> {
        Ok(())
    }
}
