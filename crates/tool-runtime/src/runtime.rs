use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::conversation::{Conversation, Message, Part};
use crate::invocation::{ApprovalGate, InvocationError, ToolInvocation};
use crate::provider::{LlmError, ToolAwareLlmProvider};
use crate::registry::ToolRegistry;
use crate::stream::{StopReason, StreamEvent};
use crate::tool::{ToolCall, ToolContext, ToolResult};

/// The core agentic loop that orchestrates LLM ↔ tool execution.
///
/// Flow: User → LLM → ToolCalls → ApprovalGate → Execute → Results →
/// LLM → ... → Final Text. A step is one model response plus the
/// resolution of its tool calls; the loop never exceeds the step
/// budget.
pub struct AgentLoop {
    provider: Arc<dyn ToolAwareLlmProvider>,
    registry: Arc<ToolRegistry>,
    max_steps: usize,
    temperature: f32,
    max_tokens: u32,
}

/// Why a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// Model produced a pure-text response
    EndTurn,
    /// Budget hit; whatever text exists is returned
    StepBudgetExhausted,
}

/// Result of driving one turn (or resuming one).
#[derive(Debug)]
pub enum TurnOutcome {
    Completed {
        events: Vec<StreamEvent>,
        reason: CompletionReason,
    },
    /// One or more side-effecting calls wait on the operator. The turn
    /// suspends; record decisions on an [`ApprovalGate`] and call
    /// [`AgentLoop::resume`].
    AwaitingApproval {
        events: Vec<StreamEvent>,
        pending: Vec<ToolInvocation>,
    },
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn ToolAwareLlmProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            max_steps: 10,
            temperature: 0.0,
            max_tokens: 4096,
        }
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Drive the turn until the model stops requesting tools, the step
    /// budget runs out, or a side-effecting call suspends on approval.
    /// The new user message must already be in the conversation.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        tool_context: &ToolContext,
    ) -> Result<TurnOutcome, AgentLoopError> {
        let mut all_events = Vec::new();

        loop {
            if conversation.turn_steps() >= self.max_steps {
                info!(max_steps = self.max_steps, "step budget exhausted, forcing termination");
                return Ok(TurnOutcome::Completed {
                    events: all_events,
                    reason: CompletionReason::StepBudgetExhausted,
                });
            }
            conversation.consume_step();
            debug!(step = conversation.turn_steps(), "starting agent loop step");

            let tools = self.registry.list();
            let mut stream = self
                .provider
                .stream_with_tools(
                    conversation.messages().to_vec(),
                    conversation.system_prompt().map(String::from),
                    tools,
                    self.temperature,
                    self.max_tokens,
                )
                .await
                .map_err(AgentLoopError::Llm)?;

            // Assemble the assistant message, preserving emission order
            // of text and tool calls.
            let mut parts: Vec<Part> = Vec::new();
            let mut text_buf = String::new();
            let mut current_call: Option<(String, String, String)> = None;

            while let Some(event_result) = stream.next().await {
                let event = event_result.map_err(AgentLoopError::Llm)?;
                match &event {
                    StreamEvent::TextDelta { text } => {
                        text_buf.push_str(text);
                    }
                    StreamEvent::ToolCallStart { id, name } => {
                        if !text_buf.is_empty() {
                            parts.push(Part::Text {
                                text: std::mem::take(&mut text_buf),
                            });
                        }
                        current_call = Some((id.clone(), name.clone(), String::new()));
                    }
                    StreamEvent::ToolCallDelta {
                        arguments_delta, ..
                    } => {
                        if let Some((_, _, args)) = &mut current_call {
                            args.push_str(arguments_delta);
                        }
                    }
                    StreamEvent::ToolCallEnd { .. } => {
                        if let Some((id, name, args)) = current_call.take() {
                            let input: Value = serde_json::from_str(&args).unwrap_or_default();
                            parts.push(Part::Tool(ToolInvocation::ready(id, name, input)));
                        }
                    }
                    StreamEvent::MessageEnd { .. } => {}
                    StreamEvent::Error { message } => {
                        warn!(message, "stream error");
                    }
                }
                all_events.push(event);
            }
            if !text_buf.is_empty() {
                parts.push(Part::Text { text: text_buf });
            }

            let mut message = Message::assistant(parts);
            let message_id = message.id.clone();

            // Partition freshly requested calls: approval-gated vs
            // immediately executable (including unknown names, which
            // resolve to an error result rather than a crash).
            let mut auto_calls: Vec<ToolCall> = Vec::new();
            let mut has_pending = false;
            for inv in message.invocations_mut() {
                if self.registry.needs_approval(&inv.tool_name).unwrap_or(false) {
                    inv.request_approval()?;
                    has_pending = true;
                } else {
                    auto_calls.push(ToolCall {
                        id: inv.id.clone(),
                        name: inv.tool_name.clone(),
                        input: inv.input.clone(),
                    });
                }
            }

            let no_calls = message.invocations().next().is_none();
            conversation.add_assistant_message(message);

            if no_calls {
                info!("agent loop complete (pure text response)");
                return Ok(TurnOutcome::Completed {
                    events: all_events,
                    reason: CompletionReason::EndTurn,
                });
            }

            // The current step still resolves everything not gated.
            info!(count = auto_calls.len(), "executing tool calls");
            let results = self.execute_calls(&auto_calls, tool_context).await;
            record_results(conversation, &message_id, &results)?;

            if has_pending {
                let pending = conversation.pending_approvals();
                info!(count = pending.len(), "turn suspended awaiting approval");
                return Ok(TurnOutcome::AwaitingApproval {
                    events: all_events,
                    pending,
                });
            }
        }
    }

    /// Continue a turn suspended on approvals. Recorded decisions are
    /// applied per invocation; approved executors run, rejects record
    /// their synthetic declined result. If every call is resolved the
    /// loop picks up where it left off (the step budget carries over).
    pub async fn resume(
        &self,
        conversation: &mut Conversation,
        gate: &ApprovalGate,
        tool_context: &ToolContext,
    ) -> Result<TurnOutcome, AgentLoopError> {
        let mut approved_calls: Vec<ToolCall> = Vec::new();
        let mut message_id = None;

        if let Some(message) = conversation.last_assistant_mut() {
            message_id = Some(message.id.clone());
            for inv in message.invocations_mut() {
                if !inv.is_pending_approval() {
                    continue;
                }
                match gate.apply(inv)? {
                    Some(true) => approved_calls.push(ToolCall {
                        id: inv.id.clone(),
                        name: inv.tool_name.clone(),
                        input: inv.input.clone(),
                    }),
                    // Reject already recorded the declined payload.
                    Some(false) => info!(call_id = %inv.id, tool = %inv.tool_name, "invocation rejected by operator"),
                    None => {}
                }
            }
        }

        if !approved_calls.is_empty() {
            info!(count = approved_calls.len(), "executing approved tool calls");
            let results = self.execute_calls(&approved_calls, tool_context).await;
            if let Some(id) = &message_id {
                record_results(conversation, id, &results)?;
            }
        }

        let pending = conversation.pending_approvals();
        if !pending.is_empty() {
            return Ok(TurnOutcome::AwaitingApproval {
                events: Vec::new(),
                pending,
            });
        }

        // All calls resolved; feed the results back to the model.
        self.run(conversation, tool_context).await
    }

    /// Execute calls concurrently; results come back in request order.
    async fn execute_calls(&self, calls: &[ToolCall], context: &ToolContext) -> Vec<ToolResult> {
        let futures = calls.iter().cloned().map(|call| {
            let registry = self.registry.clone();
            let context = context.clone();
            async move {
                match registry.get(&call.name) {
                    Some(tool) => match tool.execute(call.input.clone(), &context).await {
                        Ok(mut result) => {
                            result.tool_call_id = call.id;
                            result
                        }
                        Err(e) => {
                            let mut result = ToolResult::failure(e.to_string());
                            result.tool_call_id = call.id;
                            result
                        }
                    },
                    None => {
                        warn!(tool = %call.name, "unknown tool requested by model");
                        let mut result =
                            ToolResult::failure(format!("Unknown tool: {}", call.name));
                        result.tool_call_id = call.id;
                        result
                    }
                }
            }
        });

        futures::future::join_all(futures).await
    }
}

/// Write executor results back into the owning message's invocations.
fn record_results(
    conversation: &mut Conversation,
    message_id: &str,
    results: &[ToolResult],
) -> Result<(), AgentLoopError> {
    let Some(message) = conversation.last_assistant_mut() else {
        return Ok(());
    };
    if message.id != message_id {
        return Ok(());
    }
    for result in results {
        for inv in message.invocations_mut() {
            if inv.id != result.tool_call_id || inv.is_terminal() {
                continue;
            }
            if result.is_error {
                inv.fail(result.content.clone())?;
            } else {
                let output: Value = serde_json::from_str(&result.content)
                    .unwrap_or_else(|_| Value::String(result.content.clone()));
                inv.complete(output)?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum AgentLoopError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("invocation state error: {0}")]
    Invocation(#[from] InvocationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::InvocationState;
    use crate::provider::mock::MockLlmProvider;
    use crate::tool::testing::{memory_context, CountingTool};
    use immo_core::Principal;
    use std::sync::atomic::Ordering;

    fn loop_with(
        provider: Arc<MockLlmProvider>,
        tools: Vec<CountingTool>,
    ) -> AgentLoop {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).unwrap();
        }
        AgentLoop::new(provider as Arc<dyn ToolAwareLlmProvider>, Arc::new(registry))
    }

    fn conversation_with_user(text: &str) -> Conversation {
        let mut conv = Conversation::new(100_000);
        conv.add_user_message(Message::user_text(text));
        conv
    }

    #[tokio::test]
    async fn test_pure_text_response_completes() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_text("Gerne, womit kann ich helfen?");
        let agent = loop_with(provider, vec![]);
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Hallo");

        let outcome = agent.run(&mut conv, &ctx).await.unwrap();
        assert!(matches!(
            outcome,
            TurnOutcome::Completed {
                reason: CompletionReason::EndTurn,
                ..
            }
        ));
        assert_eq!(conv.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_auto_tool_call_executes_and_resolves() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_tool_call("call_1", "lookup", r#"{"message": "test"}"#);
        provider.queue_text("Fertig.");

        let tool = CountingTool::new("lookup", false);
        let executions = tool.executions.clone();
        let agent = loop_with(provider, vec![tool]);
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Schau nach");

        let outcome = agent.run(&mut conv, &ctx).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        assert_eq!(executions.load(Ordering::SeqCst), 1);

        let inv = conv.messages()[1].invocations().next().unwrap();
        assert_eq!(inv.state, InvocationState::OutputAvailable);
        assert_eq!(inv.output.as_ref().unwrap()["success"], true);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_part_not_crash() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_tool_call("call_1", "does_not_exist", "{}");
        provider.queue_text("Das Werkzeug kenne ich nicht.");

        let agent = loop_with(provider, vec![]);
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Mach was");

        let outcome = agent.run(&mut conv, &ctx).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));

        let inv = conv.messages()[1].invocations().next().unwrap();
        assert_eq!(inv.state, InvocationState::OutputError);
        assert!(inv.error.as_ref().unwrap().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_step_budget_forces_termination() {
        let provider = Arc::new(MockLlmProvider::new());
        // Pathological model: always requests another tool call.
        for i in 0..10 {
            provider.queue_tool_call(&format!("call_{i}"), "spin", "{}");
        }

        let tool = CountingTool::new("spin", false);
        let executions = tool.executions.clone();
        let agent = loop_with(provider, vec![tool]).with_max_steps(3);
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Weiter");

        let outcome = agent.run(&mut conv, &ctx).await.unwrap();
        assert!(matches!(
            outcome,
            TurnOutcome::Completed {
                reason: CompletionReason::StepBudgetExhausted,
                ..
            }
        ));
        assert_eq!(executions.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gated_call_suspends_without_executing() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_tool_call("call_1", "mutate", r#"{"message": "x"}"#);

        let tool = CountingTool::new("mutate", true);
        let executions = tool.executions.clone();
        let agent = loop_with(provider, vec![tool]);
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Bitte ändern");

        let outcome = agent.run(&mut conv, &ctx).await.unwrap();
        match outcome {
            TurnOutcome::AwaitingApproval { pending, .. } => {
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].tool_name, "mutate");
            }
            other => panic!("expected AwaitingApproval, got {other:?}"),
        }
        // Executor must not have run before an explicit accept.
        assert_eq!(executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_accept_resumes_and_executes() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_tool_call("call_1", "mutate", r#"{"message": "x"}"#);
        provider.queue_text("Erledigt.");

        let tool = CountingTool::new("mutate", true);
        let executions = tool.executions.clone();
        let agent = loop_with(provider, vec![tool]);
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Bitte ändern");

        let outcome = agent.run(&mut conv, &ctx).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::AwaitingApproval { .. }));

        let mut gate = ApprovalGate::new();
        gate.record("call_1", true);
        let outcome = agent.resume(&mut conv, &gate, &ctx).await.unwrap();

        assert!(matches!(
            outcome,
            TurnOutcome::Completed {
                reason: CompletionReason::EndTurn,
                ..
            }
        ));
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        let inv = conv.messages()[1].invocations().next().unwrap();
        assert_eq!(inv.state, InvocationState::OutputAvailable);
    }

    #[tokio::test]
    async fn test_reject_leaves_zero_side_effects() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_tool_call("call_1", "mutate", r#"{"message": "x"}"#);
        provider.queue_text("Verstanden, ich führe das nicht aus.");

        let tool = CountingTool::new("mutate", true);
        let executions = tool.executions.clone();
        let agent = loop_with(provider, vec![tool]);
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Bitte ändern");

        agent.run(&mut conv, &ctx).await.unwrap();

        let mut gate = ApprovalGate::new();
        gate.record("call_1", false);
        let outcome = agent.resume(&mut conv, &gate, &ctx).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        assert_eq!(executions.load(Ordering::SeqCst), 0);

        let inv = conv.messages()[1].invocations().next().unwrap();
        assert_eq!(inv.state, InvocationState::Rejected);
        assert_eq!(inv.output.as_ref().unwrap()["declined"], true);
    }

    #[tokio::test]
    async fn test_rejected_send_email_sends_nothing_and_audits_nothing() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_tool_call(
            "call_1",
            "send_email",
            r#"{"recipient": "anna@example.de", "subject": "Angebot", "body": "Hallo"}"#,
        );
        provider.queue_text("Verstanden, die E-Mail wird nicht verschickt.");

        let agent = AgentLoop::new(
            provider as Arc<dyn ToolAwareLlmProvider>,
            Arc::new(ToolRegistry::admin().unwrap()),
        );
        let (ctx, store, mailer) = memory_context(Principal::admin("A1"));
        let mut conv = conversation_with_user("Bitte E-Mail an Anna senden");

        let outcome = agent.run(&mut conv, &ctx).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::AwaitingApproval { .. }));

        let mut gate = ApprovalGate::new();
        gate.record("call_1", false);
        let outcome = agent.resume(&mut conv, &gate, &ctx).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));

        assert!(mailer.sent().await.is_empty());
        assert!(store.all_activity().await.is_empty());

        let inv = conv.messages()[1].invocations().next().unwrap();
        assert_eq!(inv.state, InvocationState::Rejected);
    }

    #[tokio::test]
    async fn test_undecided_approval_stays_pending() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_tool_call("call_1", "mutate", "{}");

        let agent = loop_with(provider, vec![CountingTool::new("mutate", true)]);
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Bitte ändern");

        agent.run(&mut conv, &ctx).await.unwrap();

        // Empty gate: no decision recorded yet.
        let gate = ApprovalGate::new();
        let outcome = agent.resume(&mut conv, &gate, &ctx).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::AwaitingApproval { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_calls_resolve_in_request_order() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_response(vec![
            StreamEvent::ToolCallStart {
                id: "call_1".to_string(),
                name: "lookup_a".to_string(),
            },
            StreamEvent::ToolCallDelta {
                id: "call_1".to_string(),
                arguments_delta: r#"{"message": "a"}"#.to_string(),
            },
            StreamEvent::ToolCallEnd {
                id: "call_1".to_string(),
            },
            StreamEvent::ToolCallStart {
                id: "call_2".to_string(),
                name: "lookup_b".to_string(),
            },
            StreamEvent::ToolCallDelta {
                id: "call_2".to_string(),
                arguments_delta: r#"{"message": "b"}"#.to_string(),
            },
            StreamEvent::ToolCallEnd {
                id: "call_2".to_string(),
            },
            StreamEvent::MessageEnd {
                stop_reason: StopReason::ToolUse,
            },
        ]);
        provider.queue_text("Beide Ergebnisse liegen vor.");

        let agent = loop_with(
            provider,
            vec![
                CountingTool::new("lookup_a", false),
                CountingTool::new("lookup_b", false),
            ],
        );
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Beides bitte");

        agent.run(&mut conv, &ctx).await.unwrap();

        let invocations: Vec<_> = conv.messages()[1].invocations().collect();
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].id, "call_1");
        assert_eq!(invocations[1].id, "call_2");
        assert!(invocations.iter().all(|i| i.state == InvocationState::OutputAvailable));
        assert_eq!(invocations[0].output.as_ref().unwrap()["message"], "a");
        assert_eq!(invocations[1].output.as_ref().unwrap()["message"], "b");
    }

    #[tokio::test]
    async fn test_text_around_tool_call_preserved_in_order() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_response(vec![
            StreamEvent::TextDelta {
                text: "Ich schaue nach. ".to_string(),
            },
            StreamEvent::ToolCallStart {
                id: "call_1".to_string(),
                name: "lookup".to_string(),
            },
            StreamEvent::ToolCallDelta {
                id: "call_1".to_string(),
                arguments_delta: "{}".to_string(),
            },
            StreamEvent::ToolCallEnd {
                id: "call_1".to_string(),
            },
            StreamEvent::MessageEnd {
                stop_reason: StopReason::ToolUse,
            },
        ]);
        provider.queue_text("Hier das Ergebnis.");

        let agent = loop_with(provider, vec![CountingTool::new("lookup", false)]);
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let mut conv = conversation_with_user("Nachschauen");

        agent.run(&mut conv, &ctx).await.unwrap();

        let parts = &conv.messages()[1].parts;
        assert!(matches!(&parts[0], Part::Text { text } if text.starts_with("Ich schaue")));
        assert!(matches!(&parts[1], Part::Tool(_)));
    }
}
