//! Google Gemini client for the Generative Language API

use crate::config::ResolvedLlmConfig;
use crate::conversation::{is_answered, Part, Role, ToolInvocation, Turn};
use crate::error::{LlmError, Result};
use crate::llm::{ChatOptions, FinishReason, LlmClient, LlmResponse, ToolDefinition, Usage};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Gemini `generateContent` client
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    headers: HashMap<String, String>,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
}

impl GeminiClient {
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Authentication {
                message: "No API key found for Gemini".to_string(),
            }
            .into());
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            headers: config.headers.clone(),
            max_tokens: config.params.max_tokens,
            top_p: config.params.top_p,
            top_k: config.params.top_k,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Build the JSON request body
    fn build_request_body(
        &self,
        turns: &[Turn],
        tools: Option<&[ToolDefinition]>,
        options: &ChatOptions,
    ) -> Value {
        let contents: Vec<Value> = turns
            .iter()
            .enumerate()
            .filter_map(|(index, turn)| to_content(turns, index, turn))
            .collect();

        let mut generation_config = Map::new();
        if let Some(temperature) = options.temperature {
            generation_config.insert("temperature".into(), json!(temperature));
        }
        if let Some(max_tokens) = options.max_tokens.or(self.max_tokens) {
            generation_config.insert("maxOutputTokens".into(), json!(max_tokens));
        }
        if let Some(top_p) = options.top_p.or(self.top_p) {
            generation_config.insert("topP".into(), json!(top_p));
        }
        if let Some(top_k) = options.top_k.or(self.top_k) {
            generation_config.insert("topK".into(), json!(top_k));
        }
        if let Some(stop) = &options.stop {
            generation_config.insert("stopSequences".into(), json!(stop));
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });

        if let Some(system) = options.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.function.name,
                        "description": tool.function.description,
                        "parameters": sanitize_schema(tool.function.parameters.clone()),
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    /// Parse a `generateContent` response
    fn parse_response(&self, json: Value) -> Result<LlmResponse> {
        let first = json["candidates"]
            .as_array()
            .and_then(|candidates| candidates.first())
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "no candidates in response".to_string(),
            })?;

        let parts = first["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut text = String::new();
        let mut invocations = Vec::new();

        for part in &parts {
            if let Some(t) = part["text"].as_str() {
                text.push_str(t);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call["name"].as_str().unwrap_or_default();
                let arguments = call["args"].as_object().cloned().unwrap_or_default();
                let mut invocation = ToolInvocation::new(name, arguments);
                if let Some(id) = call["id"].as_str() {
                    invocation = invocation.with_id(id);
                }
                invocations.push(invocation);
            }
        }

        let finish_reason = first["finishReason"].as_str().map(|reason| match reason {
            "STOP" if !invocations.is_empty() => FinishReason::ToolCalls,
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => {
                FinishReason::ContentFilter
            }
            other => FinishReason::Other(other.to_string()),
        });

        let usage = json.get("usageMetadata").map(|meta| Usage {
            prompt_tokens: meta["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: meta["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
            total_tokens: meta["totalTokenCount"].as_u64().unwrap_or(0) as u32,
        });

        let model = json["modelVersion"]
            .as_str()
            .unwrap_or(&self.model)
            .to_string();

        Ok(LlmResponse {
            turn: Turn::model(Some(text), invocations),
            usage,
            model,
            finish_reason,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat_completion(
        &self,
        turns: &[Turn],
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let options = options.unwrap_or_default();
        let body = self.build_request_body(turns, tools.as_deref(), &options);

        debug!(model = %self.model, turns = turns.len(), "Gemini API request");

        let mut request = self
            .http
            .post(self.api_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| LlmError::Network {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text).into());
        }

        let json: Value = response.json().await.map_err(|e| LlmError::InvalidResponse {
            message: e.to_string(),
        })?;

        self.parse_response(json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "google_ai"
    }
}

/// Map one turn to a Gemini `Content`. Unanswered invocations are left out.
fn to_content(turns: &[Turn], index: usize, turn: &Turn) -> Option<Value> {
    let keep_invocations = is_answered(turns, index);

    let parts: Vec<Value> = turn
        .parts()
        .iter()
        .filter_map(|part| match part {
            Part::Text { text } if text.is_empty() => None,
            Part::Text { text } => Some(json!({ "text": text })),
            Part::Invocation(invocation) if keep_invocations => Some(json!({
                "functionCall": {
                    "name": invocation.name,
                    "args": invocation.arguments,
                }
            })),
            Part::Invocation(_) => None,
            Part::Result(result) => Some(json!({
                "functionResponse": {
                    "name": result.invocation_name,
                    "response": result.outcome.to_response_object(),
                }
            })),
        })
        .collect();

    if parts.is_empty() {
        return None;
    }

    let role = match turn.role() {
        Role::Model => "model",
        Role::User | Role::ToolResult => "user",
    };
    Some(json!({ "role": role, "parts": parts }))
}

/// Strip schema keywords Gemini rejects
pub fn sanitize_schema(schema: Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "$schema" && key != "additionalProperties")
                .map(|(key, value)| (key, sanitize_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_schema).collect()),
        other => other,
    }
}

fn status_error(status: StatusCode, body: String) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Authentication { message: body },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimit,
        StatusCode::BAD_REQUEST => LlmError::InvalidRequest { message: body },
        other => LlmError::ApiError {
            status: other.as_u16(),
            message: body,
        },
    }
}
