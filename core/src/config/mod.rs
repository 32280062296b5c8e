//! Configuration data types for tytux core
//!
//! Only exports pure data types. All loading logic is in the CLI layer.

pub mod executor;
pub mod types;

pub use executor::{ExecutorBinding, ResolvedExecutorConfig, DEFAULT_ENDPOINT};
pub use types::{ModelParams, Protocol, ResolvedLlmConfig};
