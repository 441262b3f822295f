use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::conversation::Message;
use crate::stream::StreamEvent;
use crate::tool::ToolDefinition;

/// Trait for LLM providers that support tool use and streaming.
///
/// Defined here (by the consumer, the agent loop) rather than in the
/// provider crate; implementations live in `crates/llm`.
#[async_trait]
pub trait ToolAwareLlmProvider: Send + Sync {
    /// Stream a response from the LLM with tool definitions available.
    async fn stream_with_tools(
        &self,
        messages: Vec<Message>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>, LlmError>;

    /// Non-streaming convenience: collects the full response.
    async fn complete_with_tools(
        &self,
        messages: Vec<Message>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Vec<StreamEvent>, LlmError> {
        use futures::StreamExt;
        let stream = self
            .stream_with_tools(messages, system_prompt, tools, temperature, max_tokens)
            .await?;
        let events: Vec<_> = stream
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Provider name for logging/debugging (e.g. "claude")
    fn provider_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Authentication failed")]
    AuthError,
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Mock LLM provider for testing the agent loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::stream::StopReason;
    use futures::stream;
    use std::sync::Mutex;

    /// A mock provider that returns pre-configured responses, oldest
    /// queued first.
    pub struct MockLlmProvider {
        responses: Mutex<Vec<Vec<StreamEvent>>>,
    }

    impl MockLlmProvider {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
            }
        }

        /// Queue a response that will be returned on a later call.
        pub fn queue_response(&self, events: Vec<StreamEvent>) {
            self.responses.lock().unwrap().push(events);
        }

        /// Queue a simple text response.
        pub fn queue_text(&self, text: &str) {
            self.queue_response(vec![
                StreamEvent::TextDelta {
                    text: text.to_string(),
                },
                StreamEvent::MessageEnd {
                    stop_reason: StopReason::EndTurn,
                },
            ]);
        }

        /// Queue a single complete tool call.
        pub fn queue_tool_call(&self, id: &str, name: &str, arguments: &str) {
            self.queue_response(vec![
                StreamEvent::ToolCallStart {
                    id: id.to_string(),
                    name: name.to_string(),
                },
                StreamEvent::ToolCallDelta {
                    id: id.to_string(),
                    arguments_delta: arguments.to_string(),
                },
                StreamEvent::ToolCallEnd { id: id.to_string() },
                StreamEvent::MessageEnd {
                    stop_reason: StopReason::ToolUse,
                },
            ]);
        }
    }

    impl Default for MockLlmProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ToolAwareLlmProvider for MockLlmProvider {
        async fn stream_with_tools(
            &self,
            _messages: Vec<Message>,
            _system_prompt: Option<String>,
            _tools: Vec<ToolDefinition>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>, LlmError>
        {
            let mut responses = self.responses.lock().unwrap();
            let events = if responses.is_empty() {
                vec![StreamEvent::MessageEnd {
                    stop_reason: StopReason::EndTurn,
                }]
            } else {
                responses.remove(0)
            };
            Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }
}
