//! Orchestrator implementation

use super::config::{
    truncation_notice, OrchestratorConfig, APOLOGY, FIRST_CALL_TEMPERATURE, FOLLOW_UP_TEMPERATURE,
    MAX_ROUND_TRIPS,
};
use super::reply::Reply;
use crate::conversation::{Conversation, ToolInvocation, ToolOutcome, ToolResult, Turn};
use crate::error::{ConversationError, Result};
use crate::llm::{ChatOptions, LlmClient};
use crate::output::{OrchestratorEvent, OrchestratorOutput};
use crate::tools::{ToolCatalog, ToolExecutor};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where the tool loop is within a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingModel { round: usize },
    HasToolCalls { count: usize },
    ExecutingTools { count: usize },
    NoToolCalls,
    Done,
}

/// Drives one conversation between a user, a model and a tool executor
pub struct Orchestrator {
    llm_client: Arc<dyn LlmClient>,
    executor: Arc<dyn ToolExecutor>,
    catalog: ToolCatalog,
    conversation: Conversation,
    config: OrchestratorConfig,
    output: Box<dyn OrchestratorOutput>,
    state: LoopState,
}

impl Orchestrator {
    pub fn new(
        llm_client: Arc<dyn LlmClient>,
        executor: Arc<dyn ToolExecutor>,
        catalog: ToolCatalog,
        config: OrchestratorConfig,
        output: Box<dyn OrchestratorOutput>,
    ) -> Self {
        Self {
            llm_client,
            executor,
            catalog,
            conversation: Conversation::new(),
            config,
            output,
            state: LoopState::Idle,
        }
    }

    /// Answer one user message, running tools as the model asks for them.
    ///
    /// Only blank input is an error. Backend failures, truncation and unusable
    /// model output all come back as a [`Reply`] with displayable text.
    pub async fn respond(&mut self, user_text: &str) -> Result<Reply> {
        if user_text.trim().is_empty() {
            return Err(ConversationError::EmptyInput.into());
        }

        // A cancelled turn can leave any state behind
        self.transition(LoopState::Idle);

        let start = Instant::now();
        self.conversation.append(Turn::user(user_text))?;

        let definitions = self.catalog.definitions();
        let tools = if definitions.is_empty() {
            None
        } else {
            Some(definitions)
        };
        let mut round_trips = 0;

        loop {
            let temperature = if round_trips == 0 {
                FIRST_CALL_TEMPERATURE
            } else {
                FOLLOW_UP_TEMPERATURE
            };
            self.transition(LoopState::AwaitingModel { round: round_trips });
            self.emit(OrchestratorEvent::RoundTripStarted {
                round: round_trips,
                temperature,
            })
            .await;

            let options = ChatOptions {
                system_prompt: self.config.system_prompt.clone(),
                max_tokens: self.config.max_tokens,
                ..Default::default()
            }
            .with_temperature(temperature);

            let response = match self
                .llm_client
                .chat_completion(self.conversation.snapshot(), tools.clone(), Some(options))
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(round = round_trips, error = %e, "model call failed");
                    self.emit(OrchestratorEvent::BackendFailed {
                        message: e.to_string(),
                    })
                    .await;
                    self.transition(LoopState::Done);
                    return Ok(Reply::backend_failure(
                        e.to_string(),
                        round_trips,
                        elapsed_ms(start),
                    ));
                }
            };

            let invocations: Vec<ToolInvocation> =
                response.turn.invocations().into_iter().cloned().collect();
            self.conversation.append(response.turn)?;

            if invocations.is_empty() {
                self.transition(LoopState::NoToolCalls);
                break;
            }
            self.transition(LoopState::HasToolCalls {
                count: invocations.len(),
            });

            if round_trips >= MAX_ROUND_TRIPS {
                info!(round_trips, "round-trip cap reached with tool calls pending");
                self.emit(OrchestratorEvent::Truncated { round_trips }).await;
                self.transition(LoopState::Done);

                let text = match self.last_model_text() {
                    Some(text) => format!("{}\n\n{}", text, truncation_notice()),
                    None => truncation_notice(),
                };
                return Ok(Reply::truncated(text, round_trips, elapsed_ms(start)));
            }

            self.transition(LoopState::ExecutingTools {
                count: invocations.len(),
            });
            let results = self.execute_tools(&invocations).await;
            self.conversation.append(Turn::tool_results(results))?;
            round_trips += 1;
        }

        self.transition(LoopState::Done);

        match self.last_model_text() {
            Some(text) => Ok(Reply::answered(text, round_trips, elapsed_ms(start))),
            None => {
                warn!("model returned no usable text");
                Ok(Reply::malformed(
                    APOLOGY.to_string(),
                    round_trips,
                    elapsed_ms(start),
                ))
            }
        }
    }

    /// Run a setup prompt through the normal loop
    pub async fn prime(&mut self, seed: &str) -> Result<Reply> {
        debug!("priming conversation");
        self.respond(seed).await
    }

    /// Start over with a fresh conversation, optionally holding one seed user turn
    pub fn reset(&mut self, seed: Option<&str>) {
        self.conversation = match seed {
            Some(seed) if !seed.trim().is_empty() => Conversation::with_seed(seed),
            _ => Conversation::new(),
        };
        self.state = LoopState::Idle;
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn model_name(&self) -> &str {
        self.llm_client.model_name()
    }

    /// Release the executor
    pub async fn shutdown(&self) -> Result<()> {
        self.executor.shutdown().await
    }

    /// Run every invocation concurrently; results keep invocation order
    async fn execute_tools(&self, invocations: &[ToolInvocation]) -> Vec<ToolResult> {
        join_all(invocations.iter().map(|invocation| self.execute_tool(invocation))).await
    }

    async fn execute_tool(&self, invocation: &ToolInvocation) -> ToolResult {
        if !self.catalog.contains(&invocation.name) {
            warn!(tool = %invocation.name, "model requested a tool outside the catalog");
            return ToolResult::error(invocation, format!("unknown tool: {}", invocation.name));
        }

        self.emit(OrchestratorEvent::ToolInvoked {
            name: invocation.name.clone(),
            arguments: invocation.arguments.clone(),
        })
        .await;

        let start = Instant::now();
        let result = match self
            .executor
            .call(&invocation.name, &invocation.arguments)
            .await
        {
            Ok(ToolOutcome::Value(value)) => ToolResult::value(invocation, value),
            Ok(ToolOutcome::Error(message)) => {
                debug!(tool = %invocation.name, %message, "tool reported an error");
                ToolResult::error(invocation, message)
            }
            Err(e) => {
                warn!(tool = %invocation.name, error = %e, "tool execution failed");
                ToolResult::error(invocation, format!("execution failed: {}", e))
            }
        };

        self.emit(OrchestratorEvent::ToolCompleted {
            name: invocation.name.clone(),
            success: !result.outcome.is_error(),
            duration_ms: elapsed_ms(start),
        })
        .await;

        result
    }

    fn last_model_text(&self) -> Option<String> {
        self.conversation
            .last_model_turn()
            .and_then(|turn| turn.text())
            .filter(|text| !text.trim().is_empty())
    }

    fn transition(&mut self, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "orchestrator state");
        self.state = next;
    }

    async fn emit(&self, event: OrchestratorEvent) {
        if let Err(e) = self.output.emit_event(event).await {
            debug!("Failed to emit orchestrator event: {}", e);
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Part, Role};
    use crate::error::{Error, LlmError, ToolError};
    use crate::llm::{LlmResponse, ToolDefinition};
    use crate::orchestrator::{OrchestratorBuilder, ReplyOutcome};
    use crate::output::NullOutput;
    use crate::tools::ToolDescriptor;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Model that replays scripted turns and records what it was sent
    #[derive(Default)]
    struct ScriptedModel {
        script: Mutex<VecDeque<Result<Turn>>>,
        fallback: Option<fn() -> Turn>,
        seen: Mutex<Vec<(Vec<Turn>, Option<f32>)>>,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<Turn>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            })
        }

        fn always(turn: fn() -> Turn) -> Arc<Self> {
            Arc::new(Self {
                fallback: Some(turn),
                ..Default::default()
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn temperatures(&self) -> Vec<Option<f32>> {
            self.seen.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }

        fn input(&self, call: usize) -> Vec<Turn> {
            self.seen.lock().unwrap()[call].0.clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedModel {
        async fn chat_completion(
            &self,
            turns: &[Turn],
            _tools: Option<Vec<ToolDefinition>>,
            options: Option<ChatOptions>,
        ) -> Result<LlmResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((turns.to_vec(), options.and_then(|o| o.temperature)));

            let next = self.script.lock().unwrap().pop_front();
            let turn = match (next, self.fallback) {
                (Some(result), _) => result?,
                (None, Some(fallback)) => fallback(),
                (None, None) => panic!("model script exhausted"),
            };

            Ok(LlmResponse {
                turn,
                usage: None,
                model: "scripted".to_string(),
                finish_reason: None,
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    /// Executor answering from a closure and counting calls
    struct FakeExecutor {
        tools: Vec<ToolDescriptor>,
        handler: fn(&str, &Map<String, Value>) -> Result<ToolOutcome>,
        calls: AtomicUsize,
        shut_down: AtomicBool,
        list_fails: bool,
    }

    impl FakeExecutor {
        fn new(handler: fn(&str, &Map<String, Value>) -> Result<ToolOutcome>) -> Arc<Self> {
            Arc::new(Self {
                tools: vec![
                    ToolDescriptor::new("executeQuery", "Run a GraphQL query"),
                    ToolDescriptor::new("introspect", "Inspect the schema"),
                ],
                handler,
                calls: AtomicUsize::new(0),
                shut_down: AtomicBool::new(false),
                list_fails: false,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolExecutor for FakeExecutor {
        fn binding(&self) -> &str {
            "fake"
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            if self.list_fails {
                return Err(ToolError::Transport {
                    message: "server exited".into(),
                }
                .into());
            }
            Ok(self.tools.clone())
        }

        async fn call(&self, name: &str, arguments: &Map<String, Value>) -> Result<ToolOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = arguments.get("delay_ms").and_then(Value::as_u64) {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            (self.handler)(name, arguments)
        }

        async fn shutdown(&self) -> Result<()> {
            self.shut_down.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn echo_handler(_name: &str, arguments: &Map<String, Value>) -> Result<ToolOutcome> {
        Ok(ToolOutcome::Value(Value::Object(arguments.clone())))
    }

    fn query(text: &str) -> ToolInvocation {
        let mut args = Map::new();
        args.insert("query".into(), json!(text));
        ToolInvocation::new("executeQuery", args)
    }

    fn asks_for_tool() -> Turn {
        Turn::model(None, vec![query("{ actor { accounts { id } } }")])
    }

    fn answer(text: &str) -> Result<Turn> {
        Ok(Turn::model(Some(text.to_string()), vec![]))
    }

    async fn orchestrator(model: Arc<ScriptedModel>, executor: Arc<FakeExecutor>) -> Orchestrator {
        OrchestratorBuilder::new(model, executor).build().await.unwrap()
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected_without_mutation() {
        let model = ScriptedModel::new(vec![]);
        let mut orchestrator = orchestrator(model.clone(), FakeExecutor::new(echo_handler)).await;

        for input in ["", "   ", "\n\t"] {
            let err = orchestrator.respond(input).await.unwrap_err();
            assert!(err.is_empty_input());
        }
        assert!(orchestrator.conversation().is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_list_accounts_scenario() {
        let model = ScriptedModel::new(vec![
            Ok(asks_for_tool()),
            answer("You have two accounts: Production and Staging."),
        ]);
        let executor = FakeExecutor::new(|_, _| {
            Ok(ToolOutcome::Value(json!("{\"data\":{\"actor\":{\"accounts\":[{\"id\":1},{\"id\":2}]}}}")))
        });
        let mut orchestrator = orchestrator(model.clone(), executor.clone()).await;

        let reply = orchestrator.respond("list my accounts").await.unwrap();

        assert_eq!(reply.text, "You have two accounts: Production and Staging.");
        assert_eq!(reply.outcome, ReplyOutcome::Answered);
        assert_eq!(reply.round_trips, 1);

        let roles: Vec<Role> = orchestrator
            .conversation()
            .snapshot()
            .iter()
            .map(|t| t.role())
            .collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::ToolResult, Role::Model]);
        assert_eq!(executor.calls(), 1);
        assert_eq!(model.temperatures(), vec![Some(0.0), Some(1.0)]);
        assert_eq!(orchestrator.state(), LoopState::Done);
    }

    #[tokio::test]
    async fn test_plain_answer_needs_one_call() {
        let model = ScriptedModel::new(vec![answer("Hello!")]);
        let mut orchestrator = orchestrator(model.clone(), FakeExecutor::new(echo_handler)).await;

        let reply = orchestrator.respond("hi").await.unwrap();
        assert!(reply.is_answered());
        assert_eq!(reply.round_trips, 0);
        assert_eq!(orchestrator.conversation().len(), 2);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_round_trips_are_capped() {
        let model = ScriptedModel::always(asks_for_tool);
        let executor = FakeExecutor::new(echo_handler);
        let mut orchestrator = orchestrator(model.clone(), executor.clone()).await;

        let reply = orchestrator.respond("loop forever").await.unwrap();

        assert_eq!(reply.outcome, ReplyOutcome::Truncated);
        assert_eq!(reply.round_trips, MAX_ROUND_TRIPS);
        assert_eq!(executor.calls(), MAX_ROUND_TRIPS);
        assert_eq!(model.calls(), MAX_ROUND_TRIPS + 1);
        assert!(reply.text.contains("Stopped after 5 tool round-trips"));

        let temperatures = model.temperatures();
        assert_eq!(temperatures[0], Some(FIRST_CALL_TEMPERATURE));
        assert!(temperatures[1..].iter().all(|t| *t == Some(FOLLOW_UP_TEMPERATURE)));

        // user + 6 model turns + 5 tool-result turns
        assert_eq!(orchestrator.conversation().len(), 12);
    }

    #[tokio::test]
    async fn test_tool_error_reaches_next_model_call() {
        let model = ScriptedModel::new(vec![
            Ok(asks_for_tool()),
            answer("That query failed with a syntax error."),
        ]);
        let executor = FakeExecutor::new(|_, _| Ok(ToolOutcome::Error("Syntax Error".into())));
        let mut orchestrator = orchestrator(model.clone(), executor).await;

        let reply = orchestrator.respond("run a bad query").await.unwrap();
        assert!(reply.is_answered());

        let second_input = model.input(1);
        let last = second_input.last().unwrap();
        assert_eq!(last.role(), Role::ToolResult);
        assert_eq!(
            last.results()[0].outcome,
            ToolOutcome::Error("Syntax Error".into())
        );
    }

    #[tokio::test]
    async fn test_backend_failure_on_first_call() {
        let model = ScriptedModel::new(vec![Err(LlmError::Network {
            message: "connection reset".into(),
        }
        .into())]);
        let mut orchestrator = orchestrator(model, FakeExecutor::new(echo_handler)).await;

        let reply = orchestrator.respond("hello").await.unwrap();

        assert!(reply.text.starts_with("Error processing request:"));
        assert!(reply.text.contains("connection reset"));
        assert!(matches!(reply.outcome, ReplyOutcome::BackendFailure(_)));
        assert_eq!(orchestrator.conversation().len(), 1);
        assert_eq!(orchestrator.conversation().snapshot()[0].role(), Role::User);
    }

    #[tokio::test]
    async fn test_backend_failure_mid_turn_keeps_tool_results() {
        let model = ScriptedModel::new(vec![
            Ok(asks_for_tool()),
            Err(LlmError::RateLimit.into()),
        ]);
        let mut orchestrator = orchestrator(model, FakeExecutor::new(echo_handler)).await;

        let reply = orchestrator.respond("hello").await.unwrap();
        assert!(matches!(reply.outcome, ReplyOutcome::BackendFailure(_)));
        assert_eq!(reply.round_trips, 1);
        assert_eq!(orchestrator.conversation().len(), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_error_result() {
        let model = ScriptedModel::new(vec![Ok(asks_for_tool()), answer("Could not reach the API.")]);
        let executor = FakeExecutor::new(|_, _| {
            Err(ToolError::Transport {
                message: "broken pipe".into(),
            }
            .into())
        });
        let mut orchestrator = orchestrator(model, executor).await;

        orchestrator.respond("query").await.unwrap();

        let results = orchestrator.conversation().snapshot()[2].results();
        match &results[0].outcome {
            ToolOutcome::Error(message) => {
                assert!(message.starts_with("execution failed:"));
                assert!(message.contains("broken pipe"));
            }
            other => panic!("expected an error result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_executed() {
        let model = ScriptedModel::new(vec![
            Ok(Turn::model(None, vec![ToolInvocation::new("dropDatabase", Map::new())])),
            answer("I can't do that."),
        ]);
        let executor = FakeExecutor::new(echo_handler);
        let mut orchestrator = orchestrator(model, executor.clone()).await;

        orchestrator.respond("delete everything").await.unwrap();

        assert_eq!(executor.calls(), 0);
        let results = orchestrator.conversation().snapshot()[2].results();
        assert_eq!(
            results[0].outcome,
            ToolOutcome::Error("unknown tool: dropDatabase".into())
        );
    }

    #[tokio::test]
    async fn test_results_keep_invocation_order() {
        fn slow_then_fast() -> Turn {
            let mut slow = Map::new();
            slow.insert("delay_ms".into(), json!(50));
            slow.insert("tag".into(), json!("slow"));
            let mut fast = Map::new();
            fast.insert("tag".into(), json!("fast"));
            Turn::model(
                None,
                vec![
                    ToolInvocation::new("executeQuery", slow),
                    ToolInvocation::new("introspect", fast),
                ],
            )
        }

        let model = ScriptedModel::new(vec![Ok(slow_then_fast()), answer("done")]);
        let mut orchestrator = orchestrator(model, FakeExecutor::new(echo_handler)).await;

        orchestrator.respond("two at once").await.unwrap();

        let snapshot = orchestrator.conversation().snapshot();
        let invocations = snapshot[1].invocations();
        let results = snapshot[2].results();
        assert_eq!(results.len(), 2);
        for (invocation, result) in invocations.iter().zip(results.iter()) {
            assert_eq!(invocation.id, result.invocation_id);
        }
        assert_eq!(results[0].invocation_name, "executeQuery");
    }

    #[tokio::test]
    async fn test_respond_after_cancelled_turn() {
        fn slow_query() -> Turn {
            let mut args = Map::new();
            args.insert("query".into(), json!("{ actor { accounts { id } } }"));
            args.insert("delay_ms".into(), json!(5_000));
            Turn::model(None, vec![ToolInvocation::new("executeQuery", args)])
        }

        let model = ScriptedModel::new(vec![Ok(slow_query()), answer("resumed")]);
        let executor = FakeExecutor::new(echo_handler);
        let mut orchestrator = orchestrator(model.clone(), executor.clone()).await;

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            orchestrator.respond("list my accounts"),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(orchestrator.state(), LoopState::ExecutingTools { count: 1 });
        assert_eq!(executor.calls(), 1);

        let reply = orchestrator.respond("try again").await.unwrap();
        assert_eq!(reply.text, "resumed");
        assert_eq!(reply.outcome, ReplyOutcome::Answered);
        assert_eq!(orchestrator.state(), LoopState::Done);

        // the unanswered invocation stays in the log and is followed by the new user turn
        let roles: Vec<Role> = orchestrator
            .conversation()
            .snapshot()
            .iter()
            .map(|t| t.role())
            .collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User, Role::Model]);
        assert!(!orchestrator.conversation().is_answered(1));

        let second_input = model.input(1);
        assert_eq!(second_input.len(), 3);
        assert_eq!(second_input[2].text().as_deref(), Some("try again"));
        assert_eq!(model.temperatures(), vec![Some(0.0), Some(0.0)]);
    }

    #[tokio::test]
    async fn test_respond_starts_from_idle() {
        let model = ScriptedModel::new(vec![answer("one"), answer("two")]);
        let mut orchestrator = orchestrator(model, FakeExecutor::new(echo_handler)).await;
        assert_eq!(orchestrator.state(), LoopState::Idle);

        orchestrator.respond("first").await.unwrap();
        assert_eq!(orchestrator.state(), LoopState::Done);

        // blank input is rejected before any transition
        orchestrator.respond(" ").await.unwrap_err();
        assert_eq!(orchestrator.state(), LoopState::Done);

        orchestrator.respond("second").await.unwrap();
        assert_eq!(orchestrator.state(), LoopState::Done);
    }

    #[tokio::test]
    async fn test_empty_model_text_returns_apology() {
        let model = ScriptedModel::new(vec![Ok(Turn::model(None, vec![]))]);
        let mut orchestrator = orchestrator(model, FakeExecutor::new(echo_handler)).await;

        let reply = orchestrator.respond("hello").await.unwrap();
        assert_eq!(reply.text, APOLOGY);
        assert_eq!(reply.outcome, ReplyOutcome::MalformedResponse);
    }

    #[tokio::test]
    async fn test_next_turn_after_failure_appends() {
        let model = ScriptedModel::new(vec![
            Err(LlmError::RateLimit.into()),
            answer("Back online."),
        ]);
        let mut orchestrator = orchestrator(model.clone(), FakeExecutor::new(echo_handler)).await;

        orchestrator.respond("first").await.unwrap();
        let reply = orchestrator.respond("second").await.unwrap();

        assert_eq!(reply.text, "Back online.");
        let roles: Vec<Role> = model.input(1).iter().map(|t| t.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::User]);
    }

    #[tokio::test]
    async fn test_builder_primes_and_reset_reseeds() {
        let model = ScriptedModel::new(vec![answer("Ready for account 42.")]);
        let mut orchestrator = OrchestratorBuilder::new(model.clone(), FakeExecutor::new(echo_handler))
            .with_seed_prompt(Some("Use account ID 42 for ongoing queries.".into()))
            .with_output(Box::new(NullOutput))
            .build()
            .await
            .unwrap();

        assert_eq!(orchestrator.conversation().len(), 2);
        assert_eq!(orchestrator.catalog().len(), 2);

        orchestrator.reset(Some("Use account ID 42 for ongoing queries."));
        let snapshot = orchestrator.conversation().snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(matches!(&snapshot[0].parts()[0], Part::Text { text } if text.contains("42")));

        orchestrator.reset(None);
        assert!(orchestrator.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_builder_releases_executor_when_discovery_fails() {
        let executor = Arc::new(FakeExecutor {
            tools: vec![],
            handler: echo_handler,
            calls: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
            list_fails: true,
        });

        let result = OrchestratorBuilder::new(ScriptedModel::new(vec![]), executor.clone())
            .build()
            .await;

        assert!(matches!(result, Err(Error::Catalog(_))));
        assert!(executor.shut_down.load(Ordering::SeqCst));
    }
}
