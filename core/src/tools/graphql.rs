//! Direct GraphQL binding: one HTTPS POST per tool call

use super::base::{required_str, ToolDescriptor, ToolExecutor};
use crate::config::ResolvedExecutorConfig;
use crate::conversation::ToolOutcome;
use crate::error::{Result, ToolError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

pub const EXECUTE_QUERY: &str = "executeQuery";
pub const DESCRIBE_DOMAIN: &str = "describeDomain";
pub const INTROSPECT: &str = "introspect";

/// Schema introspection used when `introspect` is called without a query
pub const INTROSPECTION_QUERY: &str = "query IntrospectionQuery { __schema { queryType { name } mutationType { name } types { kind name description fields(includeDeprecated: false) { name description args { name type { kind name ofType { kind name } } } type { kind name ofType { kind name } } } } } }";

/// Static catalog for the direct binding
pub fn graphql_tool_descriptors() -> Vec<ToolDescriptor> {
    let query_schema = |required: bool| {
        let mut schema = json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "GraphQL document to send to the API"
                },
                "variables": {
                    "type": "object",
                    "description": "Optional variables for the document. accountId is filled in when the query references $accountId"
                }
            }
        });
        if required {
            schema["required"] = json!(["query"]);
        }
        schema
    };

    vec![
        ToolDescriptor::new(
            EXECUTE_QUERY,
            "Execute a GraphQL query against the analytics API and return the data. \
             The `query` argument is required; calling without it is an error.",
        )
        .with_schema(query_schema(true)),
        ToolDescriptor::new(
            DESCRIBE_DOMAIN,
            "Run a GraphQL query that explores entity domains, types and account metadata. \
             The `query` argument is required; calling without it is an error.",
        )
        .with_schema(query_schema(true)),
        ToolDescriptor::new(
            INTROSPECT,
            "Inspect the GraphQL schema. The `query` argument is optional and defaults to \
             a full schema introspection query.",
        )
        .with_schema(query_schema(false)),
    ]
}

/// Executor that posts GraphQL documents straight to the endpoint
pub struct GraphQlExecutor {
    client: Client,
    endpoint: String,
    api_key: String,
    account_id: String,
    allow_mutations: bool,
}

impl GraphQlExecutor {
    pub fn new(config: &ResolvedExecutorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            account_id: config.account_id.clone(),
            allow_mutations: config.allow_mutations,
        })
    }

    fn build_variables(&self, query: &str, arguments: &Map<String, Value>) -> Result<Map<String, Value>> {
        let mut variables = match arguments.get("variables") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(raw)) if raw.trim().is_empty() => Map::new(),
            Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
                ToolError::InvalidParameters {
                    message: format!("variables is not a JSON object: {}", e),
                }
            })?,
            Some(other) => {
                return Err(ToolError::InvalidParameters {
                    message: format!("variables must be an object, got {}", other),
                }
                .into())
            }
        };

        if query.contains("$accountId") && !variables.contains_key("accountId") {
            let account = self
                .account_id
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(self.account_id.clone()));
            variables.insert("accountId".to_string(), account);
        }

        Ok(variables)
    }

    async fn post(&self, name: &str, query: &str, variables: Map<String, Value>) -> Result<ToolOutcome> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("API-Key", &self.api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| transport_error(name, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(name, e))?;

        if !status.is_success() {
            return Ok(ToolOutcome::Error(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let parsed: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) => return Ok(ToolOutcome::Error(format!("invalid JSON from API: {}", e))),
        };

        if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .collect();
                return Ok(ToolOutcome::Error(messages.join("; ")));
            }
        }

        Ok(ToolOutcome::Value(
            parsed.get("data").cloned().unwrap_or(Value::Null),
        ))
    }
}

#[async_trait]
impl ToolExecutor for GraphQlExecutor {
    fn binding(&self) -> &str {
        "direct"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Err(ToolError::DiscoveryUnsupported {
            binding: self.binding().to_string(),
        }
        .into())
    }

    async fn call(&self, name: &str, arguments: &Map<String, Value>) -> Result<ToolOutcome> {
        let query = match name {
            EXECUTE_QUERY | DESCRIBE_DOMAIN => match required_str(arguments, "query") {
                Ok(query) => query,
                Err(e) => return Ok(ToolOutcome::Error(e.to_string())),
            },
            INTROSPECT => arguments
                .get("query")
                .and_then(Value::as_str)
                .filter(|q| !q.trim().is_empty())
                .unwrap_or(INTROSPECTION_QUERY),
            other => return Ok(ToolOutcome::Error(format!("unknown tool: {}", other))),
        };

        if !self.allow_mutations && contains_mutation(query) {
            return Ok(ToolOutcome::Error(
                "mutations are disabled for this session".to_string(),
            ));
        }

        let variables = match self.build_variables(query, arguments) {
            Ok(variables) => variables,
            Err(e) => return Ok(ToolOutcome::Error(e.to_string())),
        };

        debug!(tool = name, "posting GraphQL document");
        self.post(name, query, variables).await
    }
}

/// Whether any top-level operation in the document is a mutation.
///
/// Comments and string literals are skipped; only identifiers outside every
/// selection set and argument list are operation keywords.
pub fn contains_mutation(document: &str) -> bool {
    let mut chars = document.chars();
    let mut depth = 0usize;
    let mut word = String::new();

    while let Some(c) = chars.next() {
        if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }
        if depth == 0 && word == "mutation" {
            return true;
        }
        word.clear();

        match c {
            '#' => {
                for next in chars.by_ref() {
                    if next == '\n' || next == '\r' {
                        break;
                    }
                }
            }
            '"' => {
                let mut escaped = false;
                for next in chars.by_ref() {
                    match next {
                        _ if escaped => escaped = false,
                        '\\' => escaped = true,
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '{' | '(' => depth += 1,
            '}' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    depth == 0 && word == "mutation"
}

fn transport_error(name: &str, err: reqwest::Error) -> crate::error::Error {
    if err.is_timeout() {
        ToolError::Timeout {
            name: name.to_string(),
        }
        .into()
    } else {
        ToolError::Transport {
            message: err.to_string(),
        }
        .into()
    }
}
