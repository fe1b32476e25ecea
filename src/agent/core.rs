//! Core agent loop.
//!
//! Each request runs as a small state machine: ask the model, and either
//! dispatch the tool calls it asked for and ask again, or stop on a plain
//! text answer. The number of model calls per request is capped.

use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::context::Context;
use crate::error::AgentError;
use crate::events::Event;
use crate::llm::{ChatRequest, LlmClient, ToolCall};
use crate::metrics;
use crate::tool_display;
use crate::tools;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the agent loop
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Maximum model calls before the request fails
    pub max_iterations: usize,
    pub temperature: Option<f32>,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            temperature: None,
        }
    }
}

impl AgentLoopConfig {
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }
}

/// Token and tool usage for one request
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommandStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tool_uses: u64,
    pub iterations: u64,
}

/// Result of one user request
#[derive(Debug, Default, Clone)]
pub struct TurnResult {
    pub stats: CommandStats,
    /// The model's final answer
    pub response_text: String,
}

/// Hooks for customizing loop behavior and presentation.
pub trait AgentHooks {
    /// Build the system prompt. Called before every model call so it
    /// always reflects the current project context.
    fn build_system_prompt(&self, ctx: &Context) -> String;

    /// Text the model sent alongside tool calls.
    fn on_content(&self, content: &str) {
        eprintln!("{}", content);
    }

    fn on_tool_call(&self, name: &str, args: &Value) {
        eprintln!("{}", tool_display::format_tool_call(name, args));
    }

    fn on_tool_result(&self, name: &str, output: &str) {
        eprintln!("{}", tool_display::format_tool_result(name, output));
    }
}

/// What the model asked for on one step.
enum ModelStep {
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
    FinalAnswer(String),
}

/// Run one user request to completion.
///
/// Tool failures never end the loop; they are fed back as tool results.
/// Only a model failure or an exhausted budget returns an error.
pub fn run_loop<H: AgentHooks, C: LlmClient + ?Sized>(
    hooks: &H,
    client: &C,
    ctx: &mut Context,
    config: &AgentLoopConfig,
    user_input: &str,
) -> Result<TurnResult, AgentError> {
    ctx.request_count += 1;
    ctx.history.push_user(user_input);

    let mut stats = CommandStats::default();
    let tool_schemas = tools::schemas();

    for iteration in 1..=config.max_iterations {
        debug!(iteration, "awaiting model");
        ctx.emit(Event::run_attempt(
            &ctx.session_id,
            ctx.request_count,
            iteration as u32,
        ));
        stats.iterations += 1;

        let step = ask_model(hooks, client, ctx, config, &tool_schemas, &mut stats)?;

        match step {
            ModelStep::FinalAnswer(text) => {
                ctx.history.push_model_text(&text);
                info!(
                    iterations = stats.iterations,
                    tool_uses = stats.tool_uses,
                    "request complete"
                );
                ctx.emit(Event::run_complete(
                    &ctx.session_id,
                    ctx.request_count,
                    stats.iterations as u32,
                    stats.tool_uses as u32,
                    stats.input_tokens + stats.output_tokens,
                ));
                return Ok(TurnResult {
                    stats,
                    response_text: text,
                });
            }
            ModelStep::ToolCalls { content, calls } => {
                if let Some(content) = content {
                    hooks.on_content(&content);
                    ctx.history.push_model_text(&content);
                }
                dispatch_calls(hooks, ctx, calls, &mut stats);
            }
        }
    }

    warn!(max_iterations = config.max_iterations, "turn budget exhausted");
    ctx.emit(Event::run_budget_exceeded(
        &ctx.session_id,
        ctx.request_count,
        config.max_iterations as u32,
    ));
    Err(AgentError::BudgetExceeded {
        max_iterations: config.max_iterations,
    })
}

fn ask_model<H: AgentHooks, C: LlmClient + ?Sized>(
    hooks: &H,
    client: &C,
    ctx: &Context,
    config: &AgentLoopConfig,
    tool_schemas: &[Value],
    stats: &mut CommandStats,
) -> Result<ModelStep, AgentError> {
    let mut messages = vec![json!({
        "role": "system",
        "content": hooks.build_system_prompt(ctx),
    })];
    messages.extend(ctx.history.to_messages());

    let request = ChatRequest {
        model: ctx.target.model.clone(),
        messages,
        tools: Some(tool_schemas.to_vec()),
        tool_choice: Some("auto".to_string()),
        temperature: config.temperature,
    };

    let backend = ctx.target.backend.as_str();
    let model = ctx.target.model.as_str();
    let started = Instant::now();
    let response = match client.chat(&request) {
        Ok(r) => r,
        Err(e) => {
            let duration_ms = started.elapsed().as_millis() as u64;
            metrics::global().record_request(backend, model, false, duration_ms);
            ctx.emit(Event::model_error(backend, model, &format!("{:#}", e)));
            return Err(AgentError::Model(e));
        }
    };
    let duration_ms = started.elapsed().as_millis() as u64;
    metrics::global().record_request(backend, model, true, duration_ms);

    if let Some(usage) = response.usage {
        stats.input_tokens += usage.prompt_tokens;
        stats.output_tokens += usage.completion_tokens;
        metrics::global().record_tokens(backend, model, usage.prompt_tokens, usage.completion_tokens);
        ctx.emit(Event::model_usage(
            backend,
            model,
            usage.prompt_tokens,
            usage.completion_tokens,
            duration_ms,
        ));
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(AgentError::EmptyResponse)?;

    if choice.finish_reason.as_deref() == Some("length") {
        warn!("response truncated (max tokens reached)");
    }

    let content = choice.message.content.filter(|c| !c.trim().is_empty());
    let calls = choice.message.tool_calls.unwrap_or_default();

    if calls.is_empty() {
        Ok(ModelStep::FinalAnswer(content.unwrap_or_default()))
    } else {
        Ok(ModelStep::ToolCalls { content, calls })
    }
}

/// Execute tool calls in order, recording each call and result and
/// updating the project context from their side effects.
fn dispatch_calls<H: AgentHooks>(
    hooks: &H,
    ctx: &mut Context,
    calls: Vec<ToolCall>,
    stats: &mut CommandStats,
) {
    // Providers may omit ids; results must still pair with their call.
    let calls: Vec<(String, ToolCall)> = calls
        .into_iter()
        .map(|tc| {
            let id = if tc.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4().simple())
            } else {
                tc.id.clone()
            };
            (id, tc)
        })
        .collect();

    for (id, tc) in &calls {
        ctx.history
            .push_tool_call(id, &tc.function.name, tc.arguments());
    }

    for (id, tc) in &calls {
        let name = tc.function.name.as_str();
        let args = tc.arguments();
        stats.tool_uses += 1;

        hooks.on_tool_call(name, &args);
        ctx.emit(Event::tool_invoked(
            &ctx.session_id,
            name,
            id,
            &tc.function.arguments,
        ));

        let started = Instant::now();
        let outcome = tools::execute(name, &args, &ctx.tools);
        let duration_ms = started.elapsed().as_millis() as u64;

        debug!(tool = name, ok = outcome.ok, duration_ms, "tool finished");
        metrics::global().record_tool_call(name, outcome.ok);
        ctx.emit(Event::tool_completed(
            &ctx.session_id,
            name,
            id,
            outcome.ok,
            duration_ms,
        ));
        hooks.on_tool_result(name, &outcome.output);

        ctx.history.push_tool_result(id, name, &outcome.output);

        if let Some(effect) = &outcome.effect {
            let previous = ctx.project.active().map(String::from);
            if let Some(current) = ctx.project.observe(&ctx.rules, effect).map(String::from) {
                info!(project = %current, "active project changed");
                ctx.emit(Event::project_changed(
                    &ctx.session_id,
                    previous.as_deref(),
                    &current,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BashConfig, Target};
    use crate::llm::ChatResponse;
    use crate::project::ProjectRules;
    use crate::tools::ToolContext;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct QuietHooks;

    impl AgentHooks for QuietHooks {
        fn build_system_prompt(&self, ctx: &Context) -> String {
            format!("project: {}", ctx.project.describe())
        }
        fn on_content(&self, _content: &str) {}
        fn on_tool_call(&self, _name: &str, _args: &Value) {}
        fn on_tool_result(&self, _name: &str, _output: &str) {}
    }

    struct Scripted {
        responses: RefCell<VecDeque<ChatResponse>>,
        requests: RefCell<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl LlmClient for Scripted {
        fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
            self.requests.borrow_mut().push(request.clone());
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }
    }

    fn context(dir: &TempDir) -> Context {
        Context::new(
            Target::parse("test-model@test").unwrap(),
            ToolContext::new(dir.path(), BashConfig::default()),
            ProjectRules::default(),
        )
    }

    #[test]
    fn test_agent_loop_config_default() {
        let config = AgentLoopConfig::default();
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(config.temperature.is_none());
    }

    #[test]
    fn test_agent_loop_config_builder() {
        let config = AgentLoopConfig::default()
            .with_max_iterations(5)
            .with_temperature(0.3);
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.temperature, Some(0.3));
    }

    #[test]
    fn test_plain_text_is_final() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let client = Scripted::new(vec![ChatResponse::text("hello")]);

        let result =
            run_loop(&QuietHooks, &client, &mut ctx, &AgentLoopConfig::default(), "hi").unwrap();
        assert_eq!(result.response_text, "hello");
        assert_eq!(result.stats.iterations, 1);
        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.request_count, 1);
    }

    #[test]
    fn test_tool_failure_is_fed_back() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let client = Scripted::new(vec![
            ChatResponse::tool_calls(vec![ToolCall::new(
                "c1",
                "readFile",
                json!({"path": "missing.txt"}),
            )]),
            ChatResponse::text("that file does not exist"),
        ]);

        let result =
            run_loop(&QuietHooks, &client, &mut ctx, &AgentLoopConfig::default(), "read it")
                .unwrap();
        assert_eq!(result.response_text, "that file does not exist");
        assert_eq!(result.stats.tool_uses, 1);

        // Second request saw the failure as a tool message
        let requests = client.requests.borrow();
        let tool_msg = requests[1]
            .messages
            .iter()
            .find(|m| m["role"] == "tool")
            .unwrap();
        assert!(tool_msg["content"]
            .as_str()
            .unwrap()
            .starts_with("Error reading file:"));
    }

    #[test]
    fn test_unknown_tool_does_not_abort() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let client = Scripted::new(vec![
            ChatResponse::tool_calls(vec![ToolCall::new("c1", "rm_rf", json!({}))]),
            ChatResponse::text("sorry"),
        ]);
        let result =
            run_loop(&QuietHooks, &client, &mut ctx, &AgentLoopConfig::default(), "x").unwrap();
        assert_eq!(result.response_text, "sorry");
    }

    #[test]
    fn test_budget_exceeded() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let responses = (0..10)
            .map(|i| {
                ChatResponse::tool_calls(vec![ToolCall::new(
                    &format!("c{}", i),
                    "readFile",
                    json!({"path": "x"}),
                )])
            })
            .collect();
        let client = Scripted::new(responses);
        let config = AgentLoopConfig::default().with_max_iterations(3);

        let err = run_loop(&QuietHooks, &client, &mut ctx, &config, "loop").unwrap_err();
        assert!(matches!(err, AgentError::BudgetExceeded { max_iterations: 3 }));
        assert_eq!(client.requests.borrow().len(), 3);
    }

    #[test]
    fn test_model_error_propagates() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let client = Scripted::new(vec![]);
        let err =
            run_loop(&QuietHooks, &client, &mut ctx, &AgentLoopConfig::default(), "x").unwrap_err();
        assert!(matches!(err, AgentError::Model(_)));
    }

    #[test]
    fn test_empty_choices() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let client = Scripted::new(vec![ChatResponse {
            choices: vec![],
            usage: None,
        }]);
        let err =
            run_loop(&QuietHooks, &client, &mut ctx, &AgentLoopConfig::default(), "x").unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse));
    }

    #[test]
    fn test_prompt_sees_updated_project() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let client = Scripted::new(vec![
            ChatResponse::tool_calls(vec![ToolCall::new(
                "c1",
                "executeCommand",
                json!({"command": "mkdir demo-site"}),
            )]),
            ChatResponse::text("created"),
        ]);
        run_loop(&QuietHooks, &client, &mut ctx, &AgentLoopConfig::default(), "new site").unwrap();

        let requests = client.requests.borrow();
        assert_eq!(requests[0].messages[0]["content"], "project: (none)");
        assert_eq!(requests[1].messages[0]["content"], "project: demo-site");
        assert_eq!(ctx.project.active(), Some("demo-site"));
    }

    #[test]
    fn test_text_with_calls_sent_as_one_message() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let mut with_text = ChatResponse::tool_calls(vec![ToolCall::new(
            "c1",
            "readFile",
            json!({"path": "x"}),
        )]);
        with_text.choices[0].message.content = Some("Checking the file.".to_string());
        let client = Scripted::new(vec![with_text, ChatResponse::text("ok")]);

        run_loop(&QuietHooks, &client, &mut ctx, &AgentLoopConfig::default(), "x").unwrap();

        let requests = client.requests.borrow();
        let assistant: Vec<&Value> = requests[1]
            .messages
            .iter()
            .filter(|m| m["role"] == "assistant")
            .collect();
        assert_eq!(assistant.len(), 1);
        assert_eq!(assistant[0]["content"], "Checking the file.");
        assert_eq!(assistant[0]["tool_calls"][0]["id"], "c1");
    }

    #[test]
    fn test_missing_call_id_is_generated() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let client = Scripted::new(vec![
            ChatResponse::tool_calls(vec![ToolCall::new("", "readFile", json!({"path": "x"}))]),
            ChatResponse::text("ok"),
        ]);
        run_loop(&QuietHooks, &client, &mut ctx, &AgentLoopConfig::default(), "x").unwrap();

        let messages = ctx.history.to_messages();
        let call_id = messages[1]["tool_calls"][0]["id"].as_str().unwrap();
        assert!(call_id.starts_with("call_"));
        assert_eq!(messages[2]["tool_call_id"], call_id);
    }
}
