//! updateFile: append, replace or insert text in a file.

use super::{ParamSpec, ParamType, ToolContext, ToolDescriptor, ToolOutcome, UPDATE_FILE};
use crate::project::ToolEffect;
use crate::workspace::{self, EditFields, EditOperation, OPERATIONS};

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: UPDATE_FILE,
        description: "Update an existing file by appending, replacing, or inserting content",
        params: vec![
            ParamSpec::required("path", ParamType::String, "The full file path to update"),
            ParamSpec::required(
                "operation",
                ParamType::Enum(&OPERATIONS),
                "append | replace | insertAfter | insertBefore",
            ),
            ParamSpec::optional(
                "search",
                ParamType::String,
                "Text to search for, matched literally (replace/insert)",
            ),
            ParamSpec::optional("replace", ParamType::String, "Replacement text (replace)"),
            ParamSpec::optional(
                "insert",
                ParamType::String,
                "Text to insert (insertAfter/insertBefore)",
            ),
            ParamSpec::optional("append", ParamType::String, "Text to append (append)"),
        ],
    }
}

pub fn execute(ctx: &ToolContext, path: &str, operation: &str, fields: EditFields) -> ToolOutcome {
    let op = match EditOperation::from_fields(operation, fields) {
        Ok(op) => op,
        Err(e) => return ToolOutcome::failure(e.to_string()),
    };

    match workspace::update_file(&ctx.resolve(path), &op) {
        Ok(outcome) => {
            tracing::debug!(path, operation = op.name(), changed = outcome.changed, "file updated");
            ToolOutcome::success(
                format!("Successfully updated {}", path),
                Some(ToolEffect::FileUpdated {
                    path: path.to_string(),
                    changed: outcome.changed,
                }),
            )
        }
        Err(e) => ToolOutcome::failure(e.to_string()),
    }
}
