use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::invocation::ToolInvocation;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One tagged part of a message. Parts preserve emission order: text
/// before and after tool calls appears exactly as the model produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    File {
        url: String,
        media_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    Tool(ToolInvocation),
}

/// A message in the conversation history. The message exclusively owns
/// its parts; discarding the message discards embedded invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    /// Override the generated id, e.g. with a client-supplied one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn assistant(parts: Vec<Part>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            parts,
        }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// All embedded tool invocations.
    pub fn invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(|p| match p {
            Part::Tool(inv) => Some(inv),
            _ => None,
        })
    }

    pub fn invocations_mut(&mut self) -> impl Iterator<Item = &mut ToolInvocation> {
        self.parts.iter_mut().filter_map(|p| match p {
            Part::Tool(inv) => Some(inv),
            _ => None,
        })
    }

    /// A message is final once every embedded invocation is resolved.
    pub fn is_resolved(&self) -> bool {
        self.invocations().all(|inv| inv.is_terminal())
    }
}

/// Conversation history with context window awareness. Runtime state
/// only; durable persistence is the session store's job.
pub struct Conversation {
    messages: Vec<Message>,
    /// Maximum approximate token count before truncation
    max_tokens: usize,
    /// System prompt (always retained)
    system_prompt: Option<String>,
    /// Steps consumed by the in-flight turn; reset on user input
    turn_steps: usize,
}

impl Conversation {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_tokens,
            system_prompt: None,
            turn_steps: 0,
        }
    }

    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    /// Rebuild a conversation from a persisted message snapshot.
    pub fn from_messages(messages: Vec<Message>, max_tokens: usize) -> Self {
        Self {
            messages,
            max_tokens,
            system_prompt: None,
            turn_steps: 0,
        }
    }

    /// Seed the step counter when resuming a suspended turn whose
    /// consumed steps were persisted elsewhere.
    pub fn with_turn_steps(mut self, steps: usize) -> Self {
        self.turn_steps = steps;
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn add_user_message(&mut self, message: Message) {
        self.turn_steps = 0;
        self.upsert_message(message);
    }

    pub fn add_assistant_message(&mut self, message: Message) {
        self.upsert_message(message);
    }

    /// Idempotent per message id: replaying a message already in
    /// history replaces it in place instead of duplicating it.
    pub fn upsert_message(&mut self, message: Message) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
        } else {
            self.messages.push(message);
            self.maybe_truncate();
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn last_assistant_mut(&mut self) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// Invocations across history still waiting on the operator.
    pub fn pending_approvals(&self) -> Vec<ToolInvocation> {
        self.messages
            .iter()
            .flat_map(|m| m.invocations())
            .filter(|inv| inv.is_pending_approval())
            .cloned()
            .collect()
    }

    pub fn turn_steps(&self) -> usize {
        self.turn_steps
    }

    pub(crate) fn consume_step(&mut self) {
        self.turn_steps += 1;
    }

    /// Approximate token count using character count / 4 heuristic.
    pub fn approximate_tokens(&self) -> usize {
        let char_count: usize = self
            .messages
            .iter()
            .flat_map(|m| m.parts.iter())
            .map(|p| match p {
                Part::Text { text } => text.len(),
                Part::File { url, .. } => url.len(),
                Part::Tool(inv) => {
                    inv.input.to_string().len()
                        + inv.output.as_ref().map_or(0, |o| o.to_string().len())
                }
            })
            .sum();
        char_count / 4
    }

    /// Drop oldest messages when over token limit.
    fn maybe_truncate(&mut self) {
        while self.approximate_tokens() > self.max_tokens && self.messages.len() > 2 {
            // Keep at least the last 2 messages (current turn)
            self.messages.remove(0);
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(100_000) // 100k tokens default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::InvocationState;

    #[test]
    fn test_upsert_is_idempotent_per_message_id() {
        let mut conv = Conversation::new(100_000);
        let mut msg = Message::user_text("Hallo");
        msg.id = "m1".to_string();
        conv.add_user_message(msg.clone());

        msg.parts = vec![Part::Text {
            text: "Hallo nochmal".to_string(),
        }];
        conv.upsert_message(msg);

        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].text(), "Hallo nochmal");
    }

    #[test]
    fn test_parts_preserve_emission_order() {
        let inv = ToolInvocation::ready("call_1", "property_lookup", serde_json::json!({}));
        let msg = Message::assistant(vec![
            Part::Text {
                text: "Einen Moment, ".to_string(),
            },
            Part::Tool(inv),
            Part::Text {
                text: "hier ist das Ergebnis.".to_string(),
            },
        ]);
        assert_eq!(msg.text(), "Einen Moment, hier ist das Ergebnis.");
        assert!(matches!(msg.parts[1], Part::Tool(_)));
    }

    #[test]
    fn test_pending_approvals_collected_across_history() {
        let mut conv = Conversation::new(100_000);
        conv.add_user_message(Message::user_text("Bitte E-Mail senden"));

        let mut inv = ToolInvocation::ready("call_1", "send_email", serde_json::json!({}));
        inv.request_approval().unwrap();
        conv.add_assistant_message(Message::assistant(vec![Part::Tool(inv)]));

        let pending = conv.pending_approvals();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].state, InvocationState::ApprovalRequested);
    }

    #[test]
    fn test_message_resolution() {
        let mut inv = ToolInvocation::ready("call_1", "offer_list", serde_json::json!({}));
        let msg = Message::assistant(vec![Part::Tool(inv.clone())]);
        assert!(!msg.is_resolved());

        inv.complete(serde_json::json!({"offers": []})).unwrap();
        let msg = Message::assistant(vec![Part::Tool(inv)]);
        assert!(msg.is_resolved());
    }

    #[test]
    fn test_truncation_keeps_minimum() {
        let mut conv = Conversation::new(10); // ~40 chars
        for i in 0..50 {
            conv.add_user_message(Message::user_text(format!(
                "Eine längere Nachricht Nummer {i} mit etwas Fülltext"
            )));
        }
        assert!(conv.messages().len() <= 4);
    }

    #[test]
    fn test_part_serde_roundtrip() {
        let part = Part::File {
            url: "https://example.com/expose.pdf".to_string(),
            media_type: "application/pdf".to_string(),
            filename: Some("expose.pdf".to_string()),
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"type\":\"file\""));
        let back: Part = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Part::File { .. }));
    }
}
