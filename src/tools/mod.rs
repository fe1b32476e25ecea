//! Tool registry: descriptors advertised to the model, invocation
//! validation, and dispatch.
//!
//! Every tool returns a string, success or not. Failures are data the
//! model reads and reacts to; nothing here returns an error to the loop.

pub mod read_file;
pub mod run_command;
pub mod update_file;
pub mod write_file;

use crate::config::BashConfig;
use crate::error::ToolInvocationError;
use crate::project::ToolEffect;
use crate::workspace::EditFields;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

pub const EXECUTE_COMMAND: &str = "executeCommand";
pub const WRITE_FILE: &str = "writeFile";
pub const READ_FILE: &str = "readFile";
pub const UPDATE_FILE: &str = "updateFile";

/// Declared type of a tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: false,
            description,
        }
    }
}

/// A named capability the model may call.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// OpenAI-compatible function schema for this tool.
    pub fn schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            let mut prop = json!({
                "type": "string",
                "description": p.description,
            });
            if let ParamType::Enum(values) = &p.ty {
                prop["enum"] = json!(values);
            }
            properties.insert(p.name.to_string(), prop);
            if p.required {
                required.push(p.name);
            }
        }

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }

    /// Check `args` against the declared parameters.
    ///
    /// Enum values are only checked for being strings here; the handler
    /// reports values outside the set with the full list of valid ones.
    fn validate(&self, args: &Value) -> Result<(), ToolInvocationError> {
        for p in &self.params {
            match args.get(p.name) {
                None | Some(Value::Null) if p.required => {
                    return Err(ToolInvocationError::MissingArgument {
                        tool: self.name.to_string(),
                        argument: p.name.to_string(),
                    })
                }
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(ToolInvocationError::InvalidArgument {
                        tool: self.name.to_string(),
                        argument: p.name.to_string(),
                        expected: "string".to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

static DESCRIPTORS: Lazy<Vec<ToolDescriptor>> = Lazy::new(|| {
    vec![
        run_command::descriptor(),
        write_file::descriptor(),
        read_file::descriptor(),
        update_file::descriptor(),
    ]
});

/// All registered tools, in a fixed order.
pub fn descriptors() -> &'static [ToolDescriptor] {
    &DESCRIPTORS
}

pub fn descriptor(name: &str) -> Option<&'static ToolDescriptor> {
    DESCRIPTORS.iter().find(|d| d.name == name)
}

/// Function schemas for the model request.
pub fn schemas() -> Vec<Value> {
    DESCRIPTORS.iter().map(|d| d.schema()).collect()
}

/// A validated tool call, one payload shape per tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    ExecuteCommand {
        command: String,
    },
    WriteFile {
        path: String,
        content: String,
    },
    ReadFile {
        path: String,
    },
    UpdateFile {
        path: String,
        operation: String,
        search: Option<String>,
        replace: Option<String>,
        insert: Option<String>,
        append: Option<String>,
    },
}

fn string_arg(args: &Value, name: &str) -> Option<String> {
    args.get(name).and_then(|v| v.as_str()).map(String::from)
}

fn required_arg(args: &Value, name: &str) -> String {
    // validate() has already guaranteed presence
    string_arg(args, name).unwrap_or_default()
}

impl ToolInvocation {
    /// Validate a raw call from the model against the registry.
    pub fn parse(name: &str, args: &Value) -> Result<Self, ToolInvocationError> {
        let descriptor =
            descriptor(name).ok_or_else(|| ToolInvocationError::UnknownTool(name.to_string()))?;
        descriptor.validate(args)?;

        let invocation = match descriptor.name {
            EXECUTE_COMMAND => Self::ExecuteCommand {
                command: required_arg(args, "command"),
            },
            WRITE_FILE => Self::WriteFile {
                path: required_arg(args, "path"),
                content: required_arg(args, "content"),
            },
            READ_FILE => Self::ReadFile {
                path: required_arg(args, "path"),
            },
            UPDATE_FILE => Self::UpdateFile {
                path: required_arg(args, "path"),
                operation: required_arg(args, "operation"),
                search: string_arg(args, "search"),
                replace: string_arg(args, "replace"),
                insert: string_arg(args, "insert"),
                append: string_arg(args, "append"),
            },
            other => return Err(ToolInvocationError::UnknownTool(other.to_string())),
        };
        Ok(invocation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecuteCommand { .. } => EXECUTE_COMMAND,
            Self::WriteFile { .. } => WRITE_FILE,
            Self::ReadFile { .. } => READ_FILE,
            Self::UpdateFile { .. } => UPDATE_FILE,
        }
    }
}

/// Where tools run.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Workspace root; relative paths and commands resolve against it.
    pub root: PathBuf,
    pub bash: BashConfig,
}

impl ToolContext {
    pub fn new(root: impl Into<PathBuf>, bash: BashConfig) -> Self {
        Self {
            root: root.into(),
            bash,
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

/// Result of running one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub output: String,
    pub ok: bool,
    /// Filesystem side effect for project tracking, set only on success.
    pub effect: Option<ToolEffect>,
}

impl ToolOutcome {
    pub fn success(output: String, effect: Option<ToolEffect>) -> Self {
        Self {
            output,
            ok: true,
            effect,
        }
    }

    pub fn failure(output: String) -> Self {
        Self {
            output,
            ok: false,
            effect: None,
        }
    }
}

/// Run a validated invocation.
pub fn dispatch(invocation: &ToolInvocation, ctx: &ToolContext) -> ToolOutcome {
    match invocation {
        ToolInvocation::ExecuteCommand { command } => run_command::execute(ctx, command),
        ToolInvocation::WriteFile { path, content } => write_file::execute(ctx, path, content),
        ToolInvocation::ReadFile { path } => read_file::execute(ctx, path),
        ToolInvocation::UpdateFile {
            path,
            operation,
            search,
            replace,
            insert,
            append,
        } => {
            let fields = EditFields {
                search: search.clone(),
                replace: replace.clone(),
                insert: insert.clone(),
                append: append.clone(),
            };
            update_file::execute(ctx, path, operation, fields)
        }
    }
}

/// Validate and run a raw call. Invalid calls become failure outcomes.
pub fn execute(name: &str, args: &Value, ctx: &ToolContext) -> ToolOutcome {
    match ToolInvocation::parse(name, args) {
        Ok(invocation) => dispatch(&invocation, ctx),
        Err(e) => ToolOutcome::failure(e.to_string()),
    }
}
