pub mod conversation;
pub mod invocation;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod stream;
pub mod tool;
pub mod tools;

pub use conversation::{Conversation, Message, Part, Role};
pub use invocation::{ApprovalGate, InvocationError, InvocationState, ToolInvocation};
pub use provider::{LlmError, ToolAwareLlmProvider};
pub use registry::ToolRegistry;
pub use runtime::{AgentLoop, AgentLoopError, CompletionReason, TurnOutcome};
pub use stream::{StopReason, StreamEvent};
pub use tool::{Tool, ToolCall, ToolContext, ToolDefinition, ToolError, ToolResult};
