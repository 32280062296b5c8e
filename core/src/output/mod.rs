//! Output abstraction for orchestrator progress
//!
//! The orchestrator reports what it is doing through [`OrchestratorOutput`];
//! presentation layers decide how (or whether) to show it.

pub mod events;

pub use events::{NullOutput, OrchestratorEvent, OrchestratorOutput, OutputError};
