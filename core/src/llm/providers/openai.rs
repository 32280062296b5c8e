//! OpenAI-compatible client implementation using async-openai library

use crate::config::{Protocol, ResolvedLlmConfig};
use crate::conversation::{is_answered, Part, Role, ToolInvocation, Turn};
use crate::error::{LlmError, Result};
use crate::llm::{ChatOptions, FinishReason, LlmClient, LlmResponse, ToolDefinition, Usage};
use async_openai::{
    config::{AzureConfig, Config, OpenAIConfig},
    error::OpenAIError,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestToolMessage,
        ChatCompletionRequestToolMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, FunctionCall, FunctionObject,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

const AZURE_API_VERSION: &str = "2024-10-21";

/// OpenAI-compatible client; `C` selects plain OpenAI or Azure addressing
pub struct OpenAiClient<C: Config = OpenAIConfig> {
    client: Client<C>,
    model: String,
    provider: &'static str,
}

impl OpenAiClient<OpenAIConfig> {
    /// Create a client for OpenAI or any compatible endpoint
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        require_key(config)?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.base_url);

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client(config)?),
            model: config.model.clone(),
            provider: Protocol::OpenAICompat.as_str(),
        })
    }
}

impl OpenAiClient<AzureConfig> {
    /// Create a client for an Azure OpenAI deployment named after the model
    pub fn azure(config: &ResolvedLlmConfig) -> Result<Self> {
        require_key(config)?;

        let azure_config = AzureConfig::new()
            .with_api_base(&config.base_url)
            .with_api_key(&config.api_key)
            .with_deployment_id(&config.model)
            .with_api_version(AZURE_API_VERSION);

        Ok(Self {
            client: Client::with_config(azure_config).with_http_client(http_client(config)?),
            model: config.model.clone(),
            provider: Protocol::AzureOpenAI.as_str(),
        })
    }
}

impl<C: Config> OpenAiClient<C> {
    /// Convert turns to async-openai messages
    fn convert_turns(
        &self,
        system_prompt: Option<&str>,
        turns: &[Turn],
    ) -> Vec<ChatCompletionRequestMessage> {
        let mut converted = Vec::with_capacity(turns.len() + 1);

        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            converted.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: system.to_string().into(),
                    name: None,
                },
            ));
        }

        for (index, turn) in turns.iter().enumerate() {
            match turn.role() {
                Role::User => {
                    converted.push(ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessage {
                            content: turn.text().unwrap_or_default().into(),
                            name: None,
                        },
                    ));
                }
                Role::Model => {
                    // Calls that never got answered are rejected by the API
                    let tool_calls: Vec<ChatCompletionMessageToolCall> =
                        if is_answered(turns, index) {
                            turn.invocations()
                                .into_iter()
                                .map(|invocation| ChatCompletionMessageToolCall {
                                    id: invocation.id.clone(),
                                    r#type: ChatCompletionToolType::Function,
                                    function: FunctionCall {
                                        name: invocation.name.clone(),
                                        arguments: Value::Object(invocation.arguments.clone())
                                            .to_string(),
                                    },
                                })
                                .collect()
                        } else {
                            Vec::new()
                        };
                    let content = turn.text();

                    if content.is_none() && tool_calls.is_empty() {
                        continue;
                    }

                    converted.push(ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessage {
                            content: content.map(ChatCompletionRequestAssistantMessageContent::Text),
                            name: None,
                            tool_calls: if tool_calls.is_empty() {
                                None
                            } else {
                                Some(tool_calls)
                            },
                            audio: None,
                            refusal: None,
                            ..Default::default()
                        },
                    ));
                }
                Role::ToolResult => {
                    for part in turn.parts() {
                        if let Part::Result(result) = part {
                            converted.push(ChatCompletionRequestMessage::Tool(
                                ChatCompletionRequestToolMessage {
                                    content: ChatCompletionRequestToolMessageContent::Text(
                                        result.outcome.to_response_object().to_string(),
                                    ),
                                    tool_call_id: result.invocation_id.clone(),
                                },
                            ));
                        }
                    }
                }
            }
        }

        converted
    }

    /// Convert our tool definitions to async-openai format
    fn convert_tools(&self, tools: Vec<ToolDefinition>) -> Vec<ChatCompletionTool> {
        tools
            .into_iter()
            .map(|tool| ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: tool.function.name,
                    description: Some(tool.function.description),
                    parameters: Some(tool.function.parameters),
                    strict: None,
                },
            })
            .collect()
    }

    /// Convert async-openai response to a model turn
    fn convert_response(&self, response: CreateChatCompletionResponse) -> Result<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "No choices in response".to_string(),
            })?;

        let invocations: Vec<ToolInvocation> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tool_call| {
                let arguments: Map<String, Value> =
                    serde_json::from_str(&tool_call.function.arguments).unwrap_or_default();
                ToolInvocation::new(tool_call.function.name, arguments).with_id(tool_call.id)
            })
            .collect();

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let finish_reason = choice.finish_reason.map(|reason| match reason {
            async_openai::types::FinishReason::Stop => FinishReason::Stop,
            async_openai::types::FinishReason::Length => FinishReason::Length,
            async_openai::types::FinishReason::ToolCalls => FinishReason::ToolCalls,
            async_openai::types::FinishReason::ContentFilter => FinishReason::ContentFilter,
            async_openai::types::FinishReason::FunctionCall => FinishReason::ToolCalls,
        });

        Ok(LlmResponse {
            turn: Turn::model(choice.message.content, invocations),
            usage,
            model: response.model,
            finish_reason,
        })
    }
}

#[async_trait]
impl<C: Config + Send + Sync> LlmClient for OpenAiClient<C> {
    async fn chat_completion(
        &self,
        turns: &[Turn],
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let options = options.unwrap_or_default();
        let messages = self.convert_turns(options.system_prompt.as_deref(), turns);
        let converted_tools = tools
            .filter(|t| !t.is_empty())
            .map(|t| self.convert_tools(t));

        if let Some(ref tools) = converted_tools {
            tracing::debug!("OpenAI request with {} tools enabled", tools.len());
        }

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder.model(&self.model);
        request_builder.messages(messages);

        if let Some(tools) = converted_tools {
            request_builder.tools(tools);
        }
        if let Some(max_tokens) = options.max_tokens {
            request_builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = options.temperature {
            request_builder.temperature(temperature);
        }
        if let Some(top_p) = options.top_p {
            request_builder.top_p(top_p);
        }

        let request = request_builder.build().map_err(|e| {
            tracing::error!("Failed to build OpenAI request: {}", e);
            LlmError::InvalidRequest {
                message: format!("Failed to build request: {}", e),
            }
        })?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            tracing::error!("OpenAI API call failed: {}", e);
            map_openai_error(e)
        })?;

        let result = self.convert_response(response)?;
        let calls = result.turn.invocations();
        if !calls.is_empty() {
            tracing::debug!("OpenAI response contains {} tool calls", calls.len());
            for call in calls {
                tracing::debug!("Tool call: {} (id: {})", call.name, call.id);
            }
        }

        Ok(result)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        self.provider
    }
}

fn require_key(config: &ResolvedLlmConfig) -> Result<()> {
    if config.api_key.is_empty() {
        return Err(LlmError::Authentication {
            message: "No API key found for OpenAI".to_string(),
        }
        .into());
    }
    Ok(())
}

fn http_client(config: &ResolvedLlmConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::Reqwest(e) => LlmError::Network {
            message: e.to_string(),
        },
        OpenAIError::JSONDeserialize(e) => LlmError::InvalidResponse {
            message: e.to_string(),
        },
        OpenAIError::InvalidArgument(message) => LlmError::InvalidRequest { message },
        other => LlmError::ApiError {
            status: 500, // async-openai doesn't expose status codes directly
            message: other.to_string(),
        },
    }
}
