//! Model-provider implementations of [`immo_tool_runtime::ToolAwareLlmProvider`].

mod claude;

pub use claude::ClaudeToolProvider;
