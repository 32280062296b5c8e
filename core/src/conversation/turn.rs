//! Turn structures shared by the store, the model clients and the orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Who produced a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Human input
    User,

    /// Model reply, possibly carrying tool invocations
    Model,

    /// Results for the invocations of the preceding model turn
    ToolResult,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::ToolResult => "tool-result",
        }
    }
}

/// A request from the model to run a named tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    /// Correlation id; provider-supplied or generated
    pub id: String,

    /// Name of the tool, expected to exist in the catalog
    pub name: String,

    /// Arguments keyed by parameter name
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    /// Create an invocation with a freshly generated id
    pub fn new<S: Into<String>>(name: S, arguments: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }

    /// Replace the generated id with a provider-supplied one
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Get a string argument by key
    pub fn str_argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Outcome of running one invocation. Exactly one of value or error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Value(Value),
    Error(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Error(_))
    }

    /// The `{"result": ..}` / `{"error": ..}` object handed back to the model
    pub fn to_response_object(&self) -> Value {
        match self {
            ToolOutcome::Value(value) => serde_json::json!({ "result": value }),
            ToolOutcome::Error(message) => serde_json::json!({ "error": message }),
        }
    }
}

/// The answer to one invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub invocation_id: String,
    pub invocation_name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    /// Successful result for an invocation
    pub fn value(invocation: &ToolInvocation, value: Value) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            invocation_name: invocation.name.clone(),
            outcome: ToolOutcome::Value(value),
        }
    }

    /// Error result for an invocation
    pub fn error<S: Into<String>>(invocation: &ToolInvocation, message: S) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            invocation_name: invocation.name.clone(),
            outcome: ToolOutcome::Error(message.into()),
        }
    }
}

/// A piece of turn content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    Invocation(ToolInvocation),
    Result(ToolResult),
}

/// One immutable entry of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    role: Role,
    parts: Vec<Part>,
    created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a turn from raw parts
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            created_at: Utc::now(),
        }
    }

    /// A user turn holding a single text part
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User, vec![Part::Text { text: text.into() }])
    }

    /// A model turn with optional text followed by invocations
    pub fn model(text: Option<String>, invocations: Vec<ToolInvocation>) -> Self {
        let mut parts = Vec::with_capacity(invocations.len() + 1);
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            parts.push(Part::Text { text });
        }
        parts.extend(invocations.into_iter().map(Part::Invocation));
        Self::new(Role::Model, parts)
    }

    /// A tool-result turn, results in invocation order
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self::new(
            Role::ToolResult,
            results.into_iter().map(Part::Result).collect(),
        )
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Joined text parts, `None` when there is no text at all
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }

    /// Invocations carried by this turn, in order
    pub fn invocations(&self) -> Vec<&ToolInvocation> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Invocation(invocation) => Some(invocation),
                _ => None,
            })
            .collect()
    }

    pub fn has_invocations(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, Part::Invocation(_)))
    }

    /// Results carried by this turn, in order
    pub fn results(&self) -> Vec<&ToolResult> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Result(result) => Some(result),
                _ => None,
            })
            .collect()
    }
}
