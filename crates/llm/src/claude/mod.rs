//! Claude (Anthropic Messages API) implementation of [`ToolAwareLlmProvider`].
//!
//! Streams tool use via SSE, translating between the API wire format and
//! the provider-agnostic [`StreamEvent`] / [`Message`] types.
//!
//! [`ToolAwareLlmProvider`]: immo_tool_runtime::ToolAwareLlmProvider
//! [`StreamEvent`]: immo_tool_runtime::StreamEvent
//! [`Message`]: immo_tool_runtime::Message

mod sse;
mod streaming;
mod translate;

pub use self::streaming::ClaudeToolProvider;
