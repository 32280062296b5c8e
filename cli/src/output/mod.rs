//! Terminal rendering of orchestrator progress

pub mod cli_handler;

pub use cli_handler::{CliOutputConfig, CliOutputHandler, SpinnerSlot};
