//! Error taxonomy for tools and the agent loop.
//!
//! Tool-level errors are data: they are rendered with `Display` and fed
//! back to the model as tool results. Only `AgentError` ends a request
//! early and reaches the user directly.

use thiserror::Error;

/// A tool call the model produced that cannot be dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolInvocationError {
    #[error("Error: unknown tool '{0}'. Available tools: executeCommand, writeFile, readFile, updateFile")]
    UnknownTool(String),

    #[error("Error: missing required argument '{argument}' for {tool}")]
    MissingArgument { tool: String, argument: String },

    #[error("Error: argument '{argument}' for {tool} must be a {expected}")]
    InvalidArgument {
        tool: String,
        argument: String,
        expected: String,
    },
}

/// Failures while applying an edit to a file.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("Error: Unsupported operation '{0}'. Use append | replace | insertAfter | insertBefore")]
    UnsupportedOperation(String),

    #[error("Error: {field} {} required for {operation} operation", verb_for(.field))]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("Error updating file: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// "search and insert are", "append text is"
fn verb_for(field: &str) -> &'static str {
    if field.contains(" and ") {
        "are"
    } else {
        "is"
    }
}

/// Failures from running a shell command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Error: failed to start command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Error: {0}")]
    Stderr(String),

    #[error("Error: command exited with status {code}{detail}")]
    ExitStatus { code: i32, detail: String },

    #[error("Error: command timed out after {0} ms")]
    Timeout(u64),
}

/// Errors that terminate the current request.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("turn budget exhausted after {max_iterations} model calls without a final answer")]
    BudgetExceeded { max_iterations: usize },

    #[error("model returned no choices")]
    EmptyResponse,

    #[error("model request failed: {0:#}")]
    Model(#[from] anyhow::Error),
}
