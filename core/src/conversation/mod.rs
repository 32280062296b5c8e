//! Conversation state: turns and the append-only store

pub mod store;
pub mod turn;

pub use store::{is_answered, Conversation};
pub use turn::{Part, Role, ToolInvocation, ToolOutcome, ToolResult, Turn};
