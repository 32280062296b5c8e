//! Tool-augmented conversation loop

pub mod config;
pub mod core;
pub mod reply;

pub use config::{
    account_seed_prompt, OrchestratorBuilder, OrchestratorConfig, APOLOGY, FIRST_CALL_TEMPERATURE,
    FOLLOW_UP_TEMPERATURE, MAX_ROUND_TRIPS,
};
pub use core::{LoopState, Orchestrator};
pub use reply::{Reply, ReplyOutcome};
