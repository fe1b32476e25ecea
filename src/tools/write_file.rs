//! writeFile: create or overwrite a file.

use super::{ParamSpec, ParamType, ToolContext, ToolDescriptor, ToolOutcome, WRITE_FILE};
use crate::project::ToolEffect;
use crate::workspace;

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: WRITE_FILE,
        description: "Write content to a specified file path",
        params: vec![
            ParamSpec::required("path", ParamType::String, "The full file path to write to"),
            ParamSpec::required(
                "content",
                ParamType::String,
                "The content to write into the file",
            ),
        ],
    }
}

pub fn execute(ctx: &ToolContext, path: &str, content: &str) -> ToolOutcome {
    let target = ctx.resolve(path);
    match workspace::write_durable(&target, content) {
        Ok(()) => ToolOutcome::success(
            format!("Successfully wrote to {}", path),
            Some(ToolEffect::FileWritten {
                path: path.to_string(),
            }),
        ),
        Err(e) => ToolOutcome::failure(format!("Error writing to file: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BashConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_overwrite() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("site")).unwrap();
        let ctx = ToolContext::new(dir.path(), BashConfig::default());

        let outcome = execute(&ctx, "site/index.html", "<h1>v1</h1>");
        assert!(outcome.ok);
        assert_eq!(outcome.output, "Successfully wrote to site/index.html");
        assert_eq!(
            outcome.effect,
            Some(ToolEffect::FileWritten {
                path: "site/index.html".to_string()
            })
        );

        execute(&ctx, "site/index.html", "<h1>v2</h1>");
        assert_eq!(
            fs::read_to_string(dir.path().join("site/index.html")).unwrap(),
            "<h1>v2</h1>"
        );
    }

    #[test]
    fn test_missing_parent_is_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(dir.path(), BashConfig::default());
        let outcome = execute(&ctx, "no/such/dir/index.html", "x");
        assert!(!outcome.ok);
        assert!(outcome.output.starts_with("Error writing to file:"));
        assert!(outcome.effect.is_none());
    }
}
