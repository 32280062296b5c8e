//! Tool executors and the catalog advertised to the model

pub mod base;
pub mod catalog;
pub mod graphql;
pub mod mcp;

pub use base::{ToolDescriptor, ToolExecutor};
pub use catalog::ToolCatalog;
pub use graphql::{graphql_tool_descriptors, GraphQlExecutor};
pub use mcp::{McpChannel, McpExecutor};
