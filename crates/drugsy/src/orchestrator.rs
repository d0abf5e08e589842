use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::models::message::Message;
use crate::models::role::Role;
use crate::providers::base::Provider;
use crate::registry::{CallContext, ToolRegistry};

/// Per-conversation state: an append-only message history keyed by a
/// generated conversation id. Mutated only by appending through the
/// orchestration loop, never rewritten in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: Uuid,
    pub messages: Vec<Message>,
    pub finished: bool,
}

impl ConversationState {
    pub fn new(id: Uuid) -> Self {
        ConversationState {
            id,
            messages: Vec::new(),
            finished: false,
        }
    }

    /// Explicit update: appended messages extend the history, every other
    /// field keeps its prior value.
    pub fn with_appended(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        ConversationState {
            id: self.id,
            messages: self.messages,
            finished: self.finished,
        }
    }

    /// The text of the most recent assistant message; empty if none exists.
    pub fn last_response(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.text())
            .unwrap_or_default()
    }
}

/// Where the loop goes after inspecting the most recently generated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ExecuteTools,
    Done,
}

/// Routing looks only at the last message; earlier tool calls in history are
/// never re-evaluated.
pub fn route(last: &Message) -> Step {
    if last.tool_requests().is_empty() {
        Step::Done
    } else {
        Step::ExecuteTools
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Tool-invocation rounds allowed within a single submission before the
    /// turn is abandoned.
    pub max_tool_rounds: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig { max_tool_rounds: 8 }
    }
}

/// Drives repeated LLM invocations and tool executions until the model
/// produces a terminal answer.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
        }
    }

    /// Seed a conversation with its system instruction and, for the very
    /// first turn only, the canned welcome message.
    pub fn initialize(&self, id: Uuid, instruction: &str, welcome: &str) -> ConversationState {
        ConversationState::new(id).with_appended(vec![
            Message::system().with_text(instruction),
            Message::assistant().with_text(welcome),
        ])
    }

    /// Run one conversation turn to completion and return the grown state.
    ///
    /// The caller's state is only replaced on success: an upstream failure or
    /// an exceeded tool-loop bound leaves it untouched so the turn can be
    /// retried cleanly.
    pub async fn submit(
        &self,
        state: &ConversationState,
        user_text: &str,
        ctx: &CallContext,
    ) -> Result<ConversationState, OrchestratorError> {
        let mut working = state
            .clone()
            .with_appended(vec![Message::user().with_text(user_text)]);

        // The instruction leads the history but is passed to providers
        // out-of-band
        let (system, history_start) = match working.messages.first() {
            Some(message) if message.role == Role::System => (message.text(), 1),
            _ => (String::new(), 0),
        };

        let tools = self.registry.specs();
        let mut rounds = 0usize;

        loop {
            let (response, usage) = self
                .provider
                .complete(&system, &working.messages[history_start..], &tools)
                .await
                .map_err(OrchestratorError::Upstream)?;
            tracing::debug!(
                conversation = %working.id,
                total_tokens = ?usage.total_tokens,
                "model responded"
            );

            working.messages.push(response);
            let last = working
                .messages
                .last()
                .expect("a message was just appended");

            match route(last) {
                Step::Done => break,
                Step::ExecuteTools => {
                    rounds += 1;
                    if rounds > self.config.max_tool_rounds {
                        tracing::error!(
                            conversation = %working.id,
                            rounds = self.config.max_tool_rounds,
                            "tool-call loop bound exceeded, discarding turn"
                        );
                        return Err(OrchestratorError::ToolLoopExceeded {
                            rounds: self.config.max_tool_rounds,
                        });
                    }

                    // Strictly sequential, in request order: later calls may
                    // depend on earlier results being in history
                    let requests: Vec<_> = last
                        .tool_requests()
                        .into_iter()
                        .map(|request| (request.id.clone(), request.call.clone()))
                        .collect();
                    for (id, call) in requests {
                        let result = match call {
                            Ok(call) => self.registry.dispatch(&call, ctx).await,
                            // Malformed request from the model: feed the
                            // parse error back as the tool result
                            Err(e) => Err(e),
                        };
                        if let Err(e) = &result {
                            tracing::warn!(conversation = %working.id, error = %e, "tool call failed");
                        }
                        working
                            .messages
                            .push(Message::tool().with_tool_response(id, result));
                    }
                }
            }
        }

        Ok(working)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ToolError, ToolResult};
    use crate::models::tool::{ParamKind, ParamSpec, ToolCall, ToolSpec};
    use crate::providers::mock::{FailingProvider, MockProvider};
    use crate::registry::ToolHandler;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct DrugLookupStub {
        spec: ToolSpec,
    }

    impl DrugLookupStub {
        fn new() -> Self {
            DrugLookupStub {
                spec: ToolSpec::new(
                    "drug_label",
                    "Look up an FDA drug label",
                    vec![ParamSpec::required(
                        "search",
                        ParamKind::String,
                        "field:term query",
                    )],
                ),
            }
        }
    }

    #[async_trait]
    impl ToolHandler for DrugLookupStub {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn call(&self, arguments: Value, _ctx: &CallContext) -> ToolResult<String> {
            Ok(format!(
                "label for {}",
                arguments["search"].as_str().unwrap_or("")
            ))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(DrugLookupStub::new()));
        Arc::new(registry)
    }

    fn orchestrator(provider: Arc<MockProvider>) -> Orchestrator {
        Orchestrator::new(provider, registry(), OrchestratorConfig::default())
    }

    fn roles(state: &ConversationState) -> Vec<Role> {
        state.messages.iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn simple_response_terminates_without_tools() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("Hello!"),
        ]));
        let orchestrator = orchestrator(provider.clone());
        let state = orchestrator.initialize(Uuid::new_v4(), "instruction", "welcome");

        let updated = orchestrator
            .submit(&state, "Hi", &CallContext::anonymous())
            .await
            .unwrap();

        assert_eq!(
            roles(&updated),
            vec![Role::System, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(updated.last_response(), "Hello!");
        assert_eq!(provider.calls(), 1);
        // The caller's state was not mutated
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn tool_call_round_trip_produces_six_messages() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "call_0",
                Ok(ToolCall::new(
                    "drug_label",
                    json!({"search": "active_ingredient:ibuprofen"}),
                )),
            ),
            Message::assistant().with_text("Ibuprofen interacts with aspirin."),
        ]));
        let orchestrator = orchestrator(provider);
        let state = orchestrator.initialize(Uuid::new_v4(), "instruction", "welcome");

        let updated = orchestrator
            .submit(&state, "What interacts with ibuprofen?", &CallContext::anonymous())
            .await
            .unwrap();

        assert_eq!(
            roles(&updated),
            vec![
                Role::System,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Assistant,
            ]
        );
        assert_eq!(updated.last_response(), "Ibuprofen interacts with aspirin.");

        let tool_message = &updated.messages[4];
        let response = tool_message.content[0].as_tool_response().unwrap();
        assert_eq!(response.id, "call_0");
        assert_eq!(
            response.result.as_ref().unwrap(),
            "label for active_ingredient:ibuprofen"
        );
    }

    #[tokio::test]
    async fn multiple_tool_calls_execute_in_request_order() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant()
                .with_tool_request(
                    "call_0",
                    Ok(ToolCall::new("drug_label", json!({"search": "first"}))),
                )
                .with_tool_request(
                    "call_1",
                    Ok(ToolCall::new("drug_label", json!({"search": "second"}))),
                ),
            Message::assistant().with_text("All done!"),
        ]));
        let orchestrator = orchestrator(provider);
        let state = orchestrator.initialize(Uuid::new_v4(), "instruction", "welcome");

        let updated = orchestrator
            .submit(&state, "Check both", &CallContext::anonymous())
            .await
            .unwrap();

        assert_eq!(
            roles(&updated),
            vec![
                Role::System,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Tool,
                Role::Assistant,
            ]
        );
        let first = updated.messages[4].content[0].as_tool_response().unwrap();
        let second = updated.messages[5].content[0].as_tool_response().unwrap();
        assert_eq!(first.id, "call_0");
        assert_eq!(first.result.as_ref().unwrap(), "label for first");
        assert_eq!(second.id, "call_1");
        assert_eq!(second.result.as_ref().unwrap(), "label for second");
    }

    #[tokio::test]
    async fn unknown_tool_is_captured_not_fatal() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("call_0", Ok(ToolCall::new("invalid_tool", json!({})))),
            Message::assistant().with_text("Sorry, something went wrong."),
        ]));
        let orchestrator = orchestrator(provider);
        let state = orchestrator.initialize(Uuid::new_v4(), "instruction", "welcome");

        let updated = orchestrator
            .submit(&state, "Try it", &CallContext::anonymous())
            .await
            .unwrap();

        let response = updated.messages[4].content[0].as_tool_response().unwrap();
        assert_eq!(
            response.result,
            Err(ToolError::UnknownTool("invalid_tool".into()))
        );
        assert_eq!(updated.last_response(), "Sorry, something went wrong.");
    }

    #[tokio::test]
    async fn history_grows_monotonically_across_submissions() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("first"),
            Message::assistant().with_text("second"),
        ]));
        let orchestrator = orchestrator(provider);
        let state = orchestrator.initialize(Uuid::new_v4(), "instruction", "welcome");

        let after_first = orchestrator
            .submit(&state, "one", &CallContext::anonymous())
            .await
            .unwrap();
        let after_second = orchestrator
            .submit(&after_first, "two", &CallContext::anonymous())
            .await
            .unwrap();

        assert!(after_first.messages.len() > state.messages.len());
        assert!(after_second.messages.len() > after_first.messages.len());
        // Earlier history is preserved verbatim
        assert_eq!(
            &after_second.messages[..after_first.messages.len()],
            &after_first.messages[..]
        );
    }

    #[tokio::test]
    async fn tool_loop_bound_fails_after_configured_rounds() {
        let looping: Vec<Message> = (0..5)
            .map(|i| {
                Message::assistant().with_tool_request(
                    format!("call_{}", i),
                    Ok(ToolCall::new("drug_label", json!({"search": "again"}))),
                )
            })
            .collect();
        let provider = Arc::new(MockProvider::new(looping));
        let orchestrator = Orchestrator::new(
            provider.clone(),
            registry(),
            OrchestratorConfig { max_tool_rounds: 3 },
        );
        let state = orchestrator.initialize(Uuid::new_v4(), "instruction", "welcome");

        let err = orchestrator
            .submit(&state, "loop forever", &CallContext::anonymous())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::ToolLoopExceeded { rounds: 3 }
        ));
        // Three rounds executed plus the generation that tripped the bound
        assert_eq!(provider.calls(), 4);
        // The partial turn was discarded
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn upstream_failure_leaves_state_unmodified() {
        let orchestrator = Orchestrator::new(
            Arc::new(FailingProvider),
            registry(),
            OrchestratorConfig::default(),
        );
        let state = orchestrator.initialize(Uuid::new_v4(), "instruction", "welcome");

        let err = orchestrator
            .submit(&state, "hello", &CallContext::anonymous())
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Upstream(_)));
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn route_is_local_to_the_last_message() {
        let plain = Message::assistant().with_text("done");
        assert_eq!(route(&plain), Step::Done);

        let with_call = Message::assistant()
            .with_tool_request("call_0", Ok(ToolCall::new("drug_label", json!({}))));
        assert_eq!(route(&with_call), Step::ExecuteTools);
    }

    #[test]
    fn initialize_seeds_instruction_then_welcome() {
        let orchestrator = Orchestrator::new(
            Arc::new(MockProvider::new(vec![])),
            registry(),
            OrchestratorConfig::default(),
        );
        let id = Uuid::new_v4();
        let state = orchestrator.initialize(id, "instruction", "welcome");

        assert_eq!(state.id, id);
        assert!(!state.finished);
        assert_eq!(state.messages[0].role, Role::System);
        assert_eq!(state.messages[0].text(), "instruction");
        assert_eq!(state.messages[1].role, Role::Assistant);
        assert_eq!(state.messages[1].text(), "welcome");
    }

    #[test]
    fn with_appended_keeps_other_fields() {
        let id = Uuid::new_v4();
        let mut state = ConversationState::new(id);
        state.finished = true;
        let updated = state.with_appended(vec![Message::user().with_text("hi")]);
        assert_eq!(updated.id, id);
        assert!(updated.finished);
        assert_eq!(updated.messages.len(), 1);
    }
}
