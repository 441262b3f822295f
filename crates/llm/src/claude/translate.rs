//! Translation between the parts-based conversation types and the Claude
//! API message format.

use serde_json::{json, Value};

use immo_tool_runtime::{InvocationState, Message, Part, Role, ToolDefinition, ToolInvocation};

/// Translate a [`ToolDefinition`] into the Claude API tool format.
pub(super) fn tool_definition_to_api(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

/// Translate a message list into Claude API message objects.
///
/// An assistant message whose tool invocations are resolved expands into
/// two wire messages: the assistant turn carrying `tool_use` blocks and a
/// follow-up user turn carrying the matching `tool_result` blocks. System
/// messages travel in the top-level `system` field, not here.
pub(super) fn messages_to_api(messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::new();
    for message in messages {
        match message.role {
            Role::System => {}
            Role::User => {
                let blocks: Vec<Value> = message.parts.iter().filter_map(user_block).collect();
                if !blocks.is_empty() {
                    out.push(json!({"role": "user", "content": blocks}));
                }
            }
            Role::Assistant => {
                let mut blocks = Vec::new();
                let mut results = Vec::new();
                for part in &message.parts {
                    match part {
                        Part::Text { text } if !text.is_empty() => {
                            blocks.push(json!({"type": "text", "text": text}));
                        }
                        Part::Text { .. } | Part::File { .. } => {}
                        Part::Tool(invocation) => {
                            blocks.push(json!({
                                "type": "tool_use",
                                "id": invocation.id,
                                "name": invocation.tool_name,
                                "input": invocation.input,
                            }));
                            if let Some(result) = tool_result_block(invocation) {
                                results.push(result);
                            }
                        }
                    }
                }
                if !blocks.is_empty() {
                    out.push(json!({"role": "assistant", "content": blocks}));
                }
                if !results.is_empty() {
                    out.push(json!({"role": "user", "content": results}));
                }
            }
        }
    }
    out
}

fn user_block(part: &Part) -> Option<Value> {
    match part {
        Part::Text { text } => Some(json!({"type": "text", "text": text})),
        Part::File {
            url,
            media_type,
            filename,
        } => {
            if media_type.starts_with("image/") {
                Some(json!({
                    "type": "image",
                    "source": {"type": "url", "url": url},
                }))
            } else {
                let name = filename.as_deref().unwrap_or("Datei");
                Some(json!({
                    "type": "text",
                    "text": format!("[Anhang: {name} ({media_type}) — {url}]"),
                }))
            }
        }
        // Tool invocations never appear in user messages.
        Part::Tool(_) => None,
    }
}

/// Wire form of a resolved invocation; unresolved calls have no result
/// block yet (the loop only re-enters the provider once all calls in the
/// last assistant turn are terminal).
fn tool_result_block(invocation: &ToolInvocation) -> Option<Value> {
    match &invocation.state {
        InvocationState::OutputAvailable | InvocationState::Rejected => {
            let content = invocation
                .output
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default();
            Some(json!({
                "type": "tool_result",
                "tool_use_id": invocation.id,
                "content": content,
                "is_error": false,
            }))
        }
        InvocationState::OutputError => Some(json!({
            "type": "tool_result",
            "tool_use_id": invocation.id,
            "content": invocation.error.clone().unwrap_or_default(),
            "is_error": true,
        })),
        _ => None,
    }
}
