//! One-line renderings of tool calls and results for the terminal.

use serde_json::Value;

const MAX_VALUE_CHARS: usize = 60;
const MAX_RESULT_CHARS: usize = 120;

fn clip(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    let mut out: String = first_line.chars().take(max).collect();
    if first_line.chars().count() > max || s.lines().count() > 1 {
        out.push('…');
    }
    out
}

/// `⏺ writeFile(path=site/index.html, content=<412 chars>)`
pub fn format_tool_call(name: &str, args: &Value) -> String {
    let parts: Vec<String> = match args.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| match v.as_str() {
                // Bodies are noise on the terminal; show their size instead.
                Some(s) if matches!(k.as_str(), "content" | "append" | "insert" | "replace") => {
                    format!("{}=<{} chars>", k, s.chars().count())
                }
                Some(s) => format!("{}={}", k, clip(s, MAX_VALUE_CHARS)),
                None => format!("{}={}", k, v),
            })
            .collect(),
        None => Vec::new(),
    };
    format!("⏺ {}({})", name, parts.join(", "))
}

/// `  ⎿ Successfully wrote to site/index.html`
pub fn format_tool_result(name: &str, output: &str) -> String {
    if name == crate::tools::READ_FILE && !output.starts_with("Error") {
        return format!("  ⎿ read {} lines", output.lines().count());
    }
    format!("  ⎿ {}", clip(output.trim_end(), MAX_RESULT_CHARS))
}
