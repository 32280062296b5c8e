//! The set of tools advertised to the model

use super::base::{ToolDescriptor, ToolExecutor};
use crate::error::{CatalogError, Result};
use crate::llm::ToolDefinition;
use tracing::{debug, warn};

/// Immutable, name-unique collection of tool descriptors
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Ask the executor for its tools
    pub async fn discover(executor: &dyn ToolExecutor) -> Result<Self> {
        let tools = executor.list_tools().await.map_err(|e| CatalogError::Unavailable {
            binding: executor.binding().to_string(),
            message: e.to_string(),
        })?;

        debug!(binding = executor.binding(), count = tools.len(), "discovered tools");
        Ok(Self::declare(tools))
    }

    /// Build a catalog from static descriptors. The first of any repeated name wins.
    pub fn declare(descriptors: Vec<ToolDescriptor>) -> Self {
        let mut tools: Vec<ToolDescriptor> = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if tools.iter().any(|t| t.name == descriptor.name) {
                warn!(tool = %descriptor.name, "duplicate tool name ignored");
                continue;
            }
            tools.push(descriptor);
        }

        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    /// Function declarations for the model backend, in catalog order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDescriptor::to_definition).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolOutcome;
    use crate::error::ToolError;
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    struct ListingExecutor {
        tools: Option<Vec<ToolDescriptor>>,
    }

    #[async_trait]
    impl ToolExecutor for ListingExecutor {
        fn binding(&self) -> &str {
            "test"
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            self.tools.clone().ok_or_else(|| {
                ToolError::Transport {
                    message: "broken pipe".into(),
                }
                .into()
            })
        }

        async fn call(&self, _name: &str, _arguments: &Map<String, Value>) -> Result<ToolOutcome> {
            Ok(ToolOutcome::Value(Value::Null))
        }
    }

    #[test]
    fn test_declare_first_name_wins() {
        let catalog = ToolCatalog::declare(vec![
            ToolDescriptor::new("executeQuery", "first"),
            ToolDescriptor::new("introspect", "schema"),
            ToolDescriptor::new("executeQuery", "second"),
        ]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names(), vec!["executeQuery", "introspect"]);
        assert_eq!(catalog.get("executeQuery").unwrap().description, "first");
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = ToolCatalog::declare(vec![]);
        assert!(catalog.is_empty());
        assert!(catalog.definitions().is_empty());
        assert!(!catalog.contains("executeQuery"));
    }

    #[tokio::test]
    async fn test_discover_lists_executor_tools() {
        let executor = ListingExecutor {
            tools: Some(vec![ToolDescriptor::new("query-graphql", "Run a query")]),
        };
        let catalog = ToolCatalog::discover(&executor).await.unwrap();

        assert!(catalog.contains("query-graphql"));
        assert_eq!(catalog.definitions()[0].function.name, "query-graphql");
    }

    #[tokio::test]
    async fn test_discover_failure_is_unavailable() {
        let executor = ListingExecutor { tools: None };
        let err = ToolCatalog::discover(&executor).await.unwrap_err();

        assert!(matches!(
            err,
            crate::error::Error::Catalog(CatalogError::Unavailable { .. })
        ));
        assert!(err.to_string().contains("broken pipe"));
    }
}
