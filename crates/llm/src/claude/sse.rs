//! Incremental SSE parsing for the Claude streaming API.

use serde_json::Value;
use tracing::trace;

use immo_tool_runtime::{StopReason, StreamEvent};

/// Content-block kinds the API interleaves within one message.
#[derive(Debug, Clone)]
enum Block {
    Text,
    ToolUse { id: String },
}

/// Consumes raw response bytes and yields [`StreamEvent`]s. Tracks
/// content-block indices so tool-call deltas and stops carry the real
/// `tool_use` id instead of the block index the wire format uses.
pub(super) struct SseParser {
    buffer: String,
    current_event: Option<String>,
    blocks: Vec<Option<Block>>,
}

impl SseParser {
    pub(super) fn new() -> Self {
        Self {
            buffer: String::new(),
            current_event: None,
            blocks: Vec::new(),
        }
    }

    /// Feed one chunk; returns all events completed by it.
    pub(super) fn push(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line = self.buffer[..newline].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline);
            if line.is_empty() {
                self.current_event = None;
                continue;
            }
            if let Some(event_type) = line.strip_prefix("event: ") {
                self.current_event = Some(event_type.to_string());
            } else if let Some(data) = line.strip_prefix("data: ") {
                if let Some(event_type) = self.current_event.take() {
                    self.handle(&event_type, data, &mut events);
                }
            }
        }
        events
    }

    fn handle(&mut self, event_type: &str, data: &str, events: &mut Vec<StreamEvent>) {
        let Ok(parsed) = serde_json::from_str::<Value>(data) else {
            trace!(event_type, "unparseable SSE data");
            return;
        };
        match event_type {
            "content_block_start" => {
                let index = parsed["index"].as_u64().unwrap_or(0) as usize;
                let block = &parsed["content_block"];
                match block["type"].as_str() {
                    Some("text") => {
                        self.register(index, Block::Text);
                        if let Some(text) = block["text"].as_str() {
                            if !text.is_empty() {
                                events.push(StreamEvent::TextDelta {
                                    text: text.to_string(),
                                });
                            }
                        }
                    }
                    Some("tool_use") => {
                        let id = block["id"].as_str().unwrap_or("").to_string();
                        let name = block["name"].as_str().unwrap_or("").to_string();
                        self.register(index, Block::ToolUse { id: id.clone() });
                        events.push(StreamEvent::ToolCallStart { id, name });
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let index = parsed["index"].as_u64().unwrap_or(0) as usize;
                let delta = &parsed["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        if let Some(text) = delta["text"].as_str() {
                            events.push(StreamEvent::TextDelta {
                                text: text.to_string(),
                            });
                        }
                    }
                    Some("input_json_delta") => {
                        if let (Some(json_str), Some(Block::ToolUse { id })) =
                            (delta["partial_json"].as_str(), self.block(index))
                        {
                            events.push(StreamEvent::ToolCallDelta {
                                id: id.clone(),
                                arguments_delta: json_str.to_string(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            "content_block_stop" => {
                let index = parsed["index"].as_u64().unwrap_or(0) as usize;
                // Text-block stops are not tool-call ends.
                if let Some(Block::ToolUse { id }) = self.block(index) {
                    events.push(StreamEvent::ToolCallEnd { id: id.clone() });
                }
            }
            "message_delta" => {
                let stop_reason = match parsed["delta"]["stop_reason"].as_str() {
                    Some("tool_use") => StopReason::ToolUse,
                    Some("max_tokens") => StopReason::MaxTokens,
                    Some("stop_sequence") => StopReason::StopSequence,
                    _ => StopReason::EndTurn,
                };
                events.push(StreamEvent::MessageEnd { stop_reason });
            }
            // message_delta already carried the stop reason.
            "message_start" | "message_stop" | "ping" => {}
            "error" => {
                let message = parsed["error"]["message"]
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| data.to_string());
                events.push(StreamEvent::Error { message });
            }
            _ => {
                trace!(event_type, "ignoring unknown SSE event type");
            }
        }
    }

    fn register(&mut self, index: usize, block: Block) {
        if index >= self.blocks.len() {
            self.blocks.resize(index + 1, None);
        }
        self.blocks[index] = Some(block);
    }

    fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index).and_then(Option::as_ref)
    }
}
