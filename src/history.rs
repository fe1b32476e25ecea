//! Append-only conversation history.

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// Payload of a single turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnContent {
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        id: String,
        name: String,
        output: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

/// Ordered turns for one session. Turns are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: &str) {
        self.turns.push(Turn {
            role: Role::User,
            content: TurnContent::Text(text.to_string()),
        });
    }

    pub fn push_model_text(&mut self, text: &str) {
        self.turns.push(Turn {
            role: Role::Model,
            content: TurnContent::Text(text.to_string()),
        });
    }

    pub fn push_tool_call(&mut self, id: &str, name: &str, arguments: Value) {
        self.turns.push(Turn {
            role: Role::Model,
            content: TurnContent::ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            },
        });
    }

    /// Tool results are attributed to the user side of the exchange.
    pub fn push_tool_result(&mut self, id: &str, name: &str, output: &str) {
        self.turns.push(Turn {
            role: Role::User,
            content: TurnContent::ToolResult {
                id: id.to_string(),
                name: name.to_string(),
                output: output.to_string(),
            },
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render as chat-completions messages.
    ///
    /// Consecutive tool calls, and any text the model sent with them, are
    /// grouped into one assistant message so each `tool` message follows
    /// the assistant message that issued it.
    pub fn to_messages(&self) -> Vec<Value> {
        let mut messages: Vec<Value> = Vec::with_capacity(self.turns.len());

        for turn in &self.turns {
            match (&turn.role, &turn.content) {
                (Role::User, TurnContent::Text(text)) => {
                    messages.push(json!({ "role": "user", "content": text }));
                }
                (Role::Model, TurnContent::Text(text)) => {
                    messages.push(json!({ "role": "assistant", "content": text }));
                }
                (
                    _,
                    TurnContent::ToolCall {
                        id,
                        name,
                        arguments,
                    },
                ) => {
                    let call = json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": arguments.to_string(),
                        }
                    });
                    // Text the model sent with its calls shares their message.
                    let appended = match messages
                        .last_mut()
                        .filter(|m| m["role"] == "assistant")
                        .and_then(|m| m.as_object_mut())
                    {
                        Some(last) => last
                            .entry("tool_calls")
                            .or_insert_with(|| json!([]))
                            .as_array_mut()
                            .map(|calls| calls.push(call.clone()))
                            .is_some(),
                        None => false,
                    };
                    if !appended {
                        messages.push(json!({
                            "role": "assistant",
                            "content": Value::Null,
                            "tool_calls": [call],
                        }));
                    }
                }
                (_, TurnContent::ToolResult { id, output, .. }) => {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": id,
                        "content": output,
                    }));
                }
            }
        }

        messages
    }
}
