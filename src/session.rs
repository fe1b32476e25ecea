//! Conversation session: multi-line request intake, slash commands, and
//! one agent run per request.

use crate::agent::{run_loop, AgentHooks, AgentLoopConfig, TurnResult};
use crate::context::Context;
use crate::error::AgentError;
use crate::events::Event;
use crate::history::{Role, TurnContent};
use crate::llm::LlmClient;
use crate::metrics;
use anyhow::Result;
use std::collections::VecDeque;
use std::io::Write;
use tracing::{info, warn};

/// Line that ends a multi-line request
pub const END_SENTINEL: &str = "END";
/// Request that ends the session
pub const EXIT_SENTINEL: &str = "exit";

const COMMANDS: [&str; 6] = ["/project", "/history", "/metrics", "/help", "/exit", "/quit"];

/// True when the line names a session command. Other `/...` lines are requests.
fn is_command(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|word| COMMANDS.contains(&word))
}

/// Source of user input lines. `None` means end of input.
pub trait InputSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

impl InputSource for VecDeque<String> {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.pop_front())
    }
}

/// Read one request: lines up to the END sentinel, joined with spaces.
///
/// A first line that is `exit` or a session command is returned on its own.
/// Returns `None` at end of input with nothing collected.
pub fn read_request<I: InputSource + ?Sized>(input: &mut I) -> Result<Option<String>> {
    let mut lines: Vec<String> = Vec::new();
    loop {
        let prompt = if lines.is_empty() { "> " } else { ". " };
        let Some(line) = input.read_line(prompt)? else {
            return Ok(if lines.is_empty() {
                None
            } else {
                Some(lines.join(" "))
            });
        };

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case(END_SENTINEL) {
            return Ok(Some(lines.join(" ")));
        }
        if lines.is_empty() && (trimmed.eq_ignore_ascii_case(EXIT_SENTINEL) || is_command(trimmed)) {
            return Ok(Some(trimmed.to_string()));
        }
        lines.push(line);
    }
}

/// What the REPL loop should do after a session command.
#[derive(Debug, PartialEq, Eq)]
enum CommandResult {
    Continue,
    Exit,
}

pub struct Session<'a, H: AgentHooks> {
    client: &'a dyn LlmClient,
    hooks: H,
    ctx: Context,
    loop_config: AgentLoopConfig,
}

impl<'a, H: AgentHooks> Session<'a, H> {
    pub fn new(
        client: &'a dyn LlmClient,
        hooks: H,
        ctx: Context,
        loop_config: AgentLoopConfig,
    ) -> Self {
        ctx.emit(Event::session_created(
            &ctx.session_id,
            &ctx.tools.root.display().to_string(),
        ));
        info!(session_id = %ctx.session_id, target = %ctx.target, "session started");
        Self {
            client,
            hooks,
            ctx,
            loop_config,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Run one request through the agent loop.
    pub fn handle_request(&mut self, request: &str) -> Result<TurnResult, AgentError> {
        let result = run_loop(
            &self.hooks,
            self.client,
            &mut self.ctx,
            &self.loop_config,
            request,
        );
        if let Err(e) = &result {
            warn!(error = %e, "request failed");
        }
        result
    }

    /// Interactive loop until `exit` or end of input.
    pub fn run<I: InputSource + ?Sized, W: Write>(&mut self, input: &mut I, out: &mut W) -> Result<()> {
        writeln!(out, "sitesmith ({})", self.ctx.target)?;
        writeln!(
            out,
            "Describe what to build. Finish a request with a line containing only {}; type {} to quit.",
            END_SENTINEL, EXIT_SENTINEL
        )?;

        loop {
            writeln!(out, "\nAsk me anything (end with {}):", END_SENTINEL)?;
            out.flush()?;

            let Some(request) = read_request(input)? else {
                break;
            };
            let request = request.trim();

            if request.is_empty() {
                writeln!(
                    out,
                    "Please enter a request, or type '{}' to quit.",
                    EXIT_SENTINEL
                )?;
                continue;
            }
            if request.eq_ignore_ascii_case(EXIT_SENTINEL) {
                break;
            }
            if is_command(request) {
                if self.handle_command(request, out)? == CommandResult::Exit {
                    break;
                }
                continue;
            }

            match self.handle_request(request) {
                Ok(result) => writeln!(out, "\n{}", result.response_text)?,
                Err(e) => writeln!(out, "\nError: {}", e)?,
            }
        }

        self.end();
        writeln!(out, "Goodbye.")?;
        Ok(())
    }

    /// Emit the end-of-session event.
    pub fn end(&self) {
        self.ctx.emit(Event::session_ended(
            &self.ctx.session_id,
            self.ctx.request_count,
        ));
        info!(requests = self.ctx.request_count, "session ended");
    }

    fn handle_command<W: Write>(&self, line: &str, out: &mut W) -> Result<CommandResult> {
        let cmd = line.split_whitespace().next().unwrap_or(line);
        match cmd {
            "/project" => writeln!(out, "Active project: {}", self.ctx.project.describe())?,
            "/history" => self.print_history(out)?,
            "/metrics" => write!(out, "{}", metrics::prometheus())?,
            "/exit" | "/quit" => return Ok(CommandResult::Exit),
            _ => {
                writeln!(out, "  /project   show the active project")?;
                writeln!(out, "  /history   show this session's turns")?;
                writeln!(out, "  /metrics   show usage counters")?;
                writeln!(out, "  /exit      quit")?;
            }
        }
        Ok(CommandResult::Continue)
    }

    fn print_history<W: Write>(&self, out: &mut W) -> Result<()> {
        let turns = self.ctx.history.turns();
        if turns.is_empty() {
            writeln!(out, "(no history)")?;
            return Ok(());
        }
        for (i, turn) in turns.iter().enumerate() {
            let summary = match &turn.content {
                TurnContent::Text(text) => first_line(text),
                TurnContent::ToolCall { name, .. } => format!("call {}", name),
                TurnContent::ToolResult { name, output, .. } => {
                    format!("{} -> {}", name, first_line(output))
                }
            };
            let role = match turn.role {
                Role::User => "user ",
                Role::Model => "model",
            };
            writeln!(out, "{:>3} {} {}", i + 1, role, summary)?;
        }
        Ok(())
    }
}

fn first_line(s: &str) -> String {
    let line = s.lines().next().unwrap_or("");
    if line.chars().count() > 80 {
        let clipped: String = line.chars().take(80).collect();
        format!("{}…", clipped)
    } else {
        line.to_string()
    }
}
