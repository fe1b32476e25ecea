//! Chat-completions types and the client seam used by the agent loop.

pub mod openai;

use crate::config::Config;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub use openai::OpenAiClient;

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as sent by the provider
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    /// Parsed arguments; malformed JSON yields an empty object so the
    /// registry reports the missing fields.
    pub fn arguments(&self) -> Value {
        serde_json::from_str(&self.function.arguments)
            .unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// A response carrying only text.
    pub fn text(content: &str) -> Self {
        Self {
            choices: vec![Choice {
                message: ResponseMessage {
                    content: Some(content.to_string()),
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        }
    }

    /// A response requesting tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            choices: vec![Choice {
                message: ResponseMessage {
                    content: None,
                    tool_calls: Some(calls),
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
        }
    }
}

/// The model collaborator. Implementations own retries and rate limits.
pub trait LlmClient {
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        (**self).chat(request)
    }
}

/// Lazily-built clients keyed by backend name.
pub struct Backends {
    config: Config,
    clients: HashMap<String, Box<dyn LlmClient>>,
}

impl Backends {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clients: HashMap::new(),
        }
    }

    /// Register a prebuilt client under `name`, bypassing config.
    pub fn insert(&mut self, name: &str, client: Box<dyn LlmClient>) {
        self.clients.insert(name.to_string(), client);
    }

    pub fn get_client(&mut self, name: &str) -> Result<&dyn LlmClient> {
        if !self.clients.contains_key(name) {
            let backend = self
                .config
                .backend(name)
                .ok_or_else(|| anyhow!("Unknown backend '{}'", name))?;
            let client = OpenAiClient::new(&backend.base_url, backend.resolve_api_key())?;
            self.clients.insert(name.to_string(), Box::new(client));
        }
        self.clients
            .get(name)
            .map(|c| &**c)
            .ok_or_else(|| anyhow!("Unknown backend '{}'", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tool_call_response() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "executeCommand",
                            "arguments": "{\"command\":\"mkdir site\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        });
        let resp: ChatResponse = serde_json::from_value(body).unwrap();
        let call = &resp.choices[0].message.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.function.name, "executeCommand");
        assert_eq!(call.arguments()["command"], "mkdir site");
        assert_eq!(resp.usage.unwrap().prompt_tokens, 12);
    }

    #[test]
    fn test_malformed_arguments_become_empty_object() {
        let call = ToolCall {
            id: "x".to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: "readFile".to_string(),
                arguments: "{not json".to_string(),
            },
        };
        assert_eq!(call.arguments(), json!({}));
    }

    #[test]
    fn test_request_skips_empty_fields() {
        let req = ChatRequest {
            model: "m".to_string(),
            messages: vec![],
            tools: None,
            tool_choice: None,
            temperature: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("tools").is_none());
        assert!(v.get("temperature").is_none());
    }

    #[test]
    fn test_unknown_backend() {
        let mut backends = Backends::new(Config::default());
        assert!(backends.get_client("nowhere").is_err());
    }
}
