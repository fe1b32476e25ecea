//! readFile: return a file's raw text.

use super::{ParamSpec, ParamType, ToolContext, ToolDescriptor, ToolOutcome, READ_FILE};

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: READ_FILE,
        description: "Read and return the contents of a file",
        params: vec![ParamSpec::required(
            "path",
            ParamType::String,
            "The full file path to read from",
        )],
    }
}

pub fn execute(ctx: &ToolContext, path: &str) -> ToolOutcome {
    match std::fs::read_to_string(ctx.resolve(path)) {
        Ok(content) => ToolOutcome::success(content, None),
        Err(e) => ToolOutcome::failure(format!("Error reading file: {}", e)),
    }
}
