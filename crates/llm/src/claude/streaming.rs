//! [`ToolAwareLlmProvider`] implementation for the Claude streaming API.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use tracing::debug;

use immo_tool_runtime::{LlmError, Message, StreamEvent, ToolAwareLlmProvider, ToolDefinition};

use super::sse::SseParser;
use super::translate::{messages_to_api, tool_definition_to_api};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Claude (Anthropic) provider with streaming tool-use support.
///
/// Posts to the Messages API (`/v1/messages`) with `stream: true` and
/// emits incremental [`StreamEvent`]s the agent loop consumes.
pub struct ClaudeToolProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeToolProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    pub fn with_defaults(api_key: String) -> Self {
        Self::new(
            api_key,
            DEFAULT_MODEL.to_string(),
            DEFAULT_BASE_URL.to_string(),
        )
    }
}

#[async_trait]
impl ToolAwareLlmProvider for ClaudeToolProvider {
    async fn stream_with_tools(
        &self,
        messages: Vec<Message>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);

        let api_tools: Vec<Value> = tools.iter().map(tool_definition_to_api).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages_to_api(&messages),
            "temperature": temperature,
            "max_tokens": max_tokens,
            "stream": true,
        });
        if !api_tools.is_empty() {
            body["tools"] = json!(api_tools);
        }
        if let Some(system) = &system_prompt {
            body["system"] = json!(system);
        }

        debug!(model = %self.model, url = %url, "starting Claude streaming request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.unwrap_or_default();
            if status == 401 {
                return Err(LlmError::AuthError);
            }
            if status == 429 {
                let retry_after = serde_json::from_str::<Value>(&body_text)
                    .ok()
                    .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                    .unwrap_or(30);
                return Err(LlmError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }
            return Err(LlmError::ApiError {
                status,
                message: body_text,
            });
        }

        struct State {
            bytes: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
            parser: SseParser,
            pending: VecDeque<StreamEvent>,
        }

        let state = State {
            bytes: Box::pin(response.bytes_stream()),
            parser: SseParser::new(),
            pending: VecDeque::new(),
        };

        let event_stream = stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((Ok(event), state));
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let text = String::from_utf8_lossy(&chunk);
                        state.pending.extend(state.parser.push(&text));
                    }
                    Some(Err(e)) => {
                        return Some((Err(LlmError::StreamError(e.to_string())), state));
                    }
                    None => {
                        return state.pending.pop_front().map(|event| (Ok(event), state));
                    }
                }
            }
        });

        Ok(Box::pin(event_stream))
    }

    fn provider_name(&self) -> &str {
        "claude"
    }
}
