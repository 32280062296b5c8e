//! Base tool traits and structures

use crate::conversation::ToolOutcome;
use crate::error::{Result, ToolError};
use crate::llm::{FunctionDefinition, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A callable tool advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    /// Unique within a catalog
    pub name: String,

    /// Natural-language description shown to the model
    pub description: String,

    /// JSON schema for the tool's arguments
    #[serde(default, rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub parameter_schema: Option<Value>,
}

impl ToolDescriptor {
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema: None,
        }
    }

    /// Attach a parameter schema
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.parameter_schema = Some(schema);
        self
    }

    /// Function declaration handed to the model backend
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: self
                    .parameter_schema
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
            },
        }
    }
}

/// Something that can run named tools.
///
/// `call` returns `Ok(ToolOutcome::Error)` for errors the tool itself reported and
/// `Err` for transport failures (spawn, I/O, timeout, network).
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Short binding name used in logs and errors
    fn binding(&self) -> &str;

    /// Ask the executor which tools it provides
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Run one tool
    async fn call(&self, name: &str, arguments: &Map<String, Value>) -> Result<ToolOutcome>;

    /// Release the executor. Calls after shutdown fail with a transport error.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Fetch a required string argument, reporting a caller error when absent
pub fn required_str<'a>(arguments: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            ToolError::InvalidParameters {
                message: format!("Missing parameter: {}", key),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_definition_defaults_schema() {
        let descriptor = ToolDescriptor::new("introspect", "Inspect the schema");
        let definition = descriptor.to_definition();

        assert_eq!(definition.tool_type, "function");
        assert_eq!(definition.function.name, "introspect");
        assert_eq!(definition.function.parameters["type"], "object");
    }

    #[test]
    fn test_descriptor_parses_mcp_listing() {
        let raw = json!({
            "name": "query-graphql",
            "description": "Query a GraphQL endpoint",
            "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}
        });
        let descriptor: ToolDescriptor = serde_json::from_value(raw).unwrap();

        assert_eq!(descriptor.name, "query-graphql");
        assert!(descriptor.parameter_schema.is_some());
    }

    #[test]
    fn test_required_str() {
        let mut arguments = Map::new();
        arguments.insert("query".into(), json!("{ actor { user { name } } }"));
        arguments.insert("blank".into(), json!("  "));

        assert!(required_str(&arguments, "query").is_ok());
        assert!(required_str(&arguments, "blank").is_err());
        assert!(required_str(&arguments, "missing").is_err());
    }
}
