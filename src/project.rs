//! Active-project tracking.
//!
//! The "current project" is inferred from what tools did on disk, using two
//! enumerable rules: a `mkdir` command shape, and writes to a known set of
//! top-level project file names. The result is best effort; paths the
//! rules do not recognize leave the context as it was.

use once_cell::sync::Lazy;
use regex::Regex;

/// `mkdir` at the start of the command or after `&&`, `;` or a newline,
/// skipping flags like `-p` and the mode argument of `-m`/`--mode`,
/// capturing the first path argument.
static MKDIR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|&&|;|\n)\s*mkdir\s+(?:(?:-m\s+\S+|--mode(?:=|\s+)\S+|-\S+)\s+)*([\w./\\][\w\-./\\]*)",
    )
    .expect("mkdir pattern is valid")
});

/// Default recognized project file names (compared case-insensitively).
pub const DEFAULT_PROJECT_FILES: [&str; 4] = ["index.html", "style.css", "script.js", "readme.md"];

/// A filesystem side effect reported by a tool after it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolEffect {
    /// A shell command finished with no error output.
    CommandSucceeded { command: String },
    /// A file was created or fully overwritten.
    FileWritten { path: String },
    /// An edit was applied; `changed` is false for no-op edits.
    FileUpdated { path: String, changed: bool },
}

/// Rule table used to recognize project-defining effects.
#[derive(Debug, Clone)]
pub struct ProjectRules {
    project_files: Vec<String>,
}

impl Default for ProjectRules {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_FILES.iter().map(|s| s.to_string()))
    }
}

impl ProjectRules {
    pub fn new<I: IntoIterator<Item = String>>(project_files: I) -> Self {
        Self {
            project_files: project_files
                .into_iter()
                .map(|f| f.to_lowercase())
                .collect(),
        }
    }

    /// Directory named by the first recognized `mkdir` in `command`.
    pub fn created_directory(&self, command: &str) -> Option<String> {
        let caps = MKDIR_PATTERN.captures(command)?;
        let raw = caps.get(1)?.as_str().trim();
        let normalized = normalize(raw);
        if normalized.is_empty() || normalized == "." {
            None
        } else {
            Some(normalized)
        }
    }

    /// Parent directory of `path` when its file name is a project file.
    pub fn project_dir_of(&self, path: &str) -> Option<String> {
        let normalized = normalize(path);
        let idx = normalized.rfind('/')?;
        if idx == 0 {
            return None;
        }
        let file_name = normalized[idx + 1..].to_lowercase();
        if self.project_files.iter().any(|f| *f == file_name) {
            Some(normalized[..idx].to_string())
        } else {
            None
        }
    }

    pub fn project_files(&self) -> &[String] {
        &self.project_files
    }
}

fn normalize(path: &str) -> String {
    let mut s = path.replace('\\', "/");
    while let Some(rest) = s.strip_prefix("./") {
        s = rest.to_string();
    }
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

/// The active project directory for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectContext {
    active: Option<String>,
}

impl ProjectContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Label used in prompts and the REPL.
    pub fn describe(&self) -> &str {
        self.active.as_deref().unwrap_or("(none)")
    }

    /// Apply the tracking rules to one tool effect. Returns the new value
    /// when the context changed.
    pub fn observe(&mut self, rules: &ProjectRules, effect: &ToolEffect) -> Option<&str> {
        let candidate = match effect {
            ToolEffect::CommandSucceeded { command } => rules.created_directory(command),
            ToolEffect::FileWritten { path } => rules.project_dir_of(path),
            ToolEffect::FileUpdated {
                path,
                changed: true,
            } => rules.project_dir_of(path),
            ToolEffect::FileUpdated { changed: false, .. } => None,
        }?;

        if self.active.as_deref() == Some(candidate.as_str()) {
            return None;
        }
        self.active = Some(candidate);
        self.active.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(c: &str) -> ToolEffect {
        ToolEffect::CommandSucceeded {
            command: c.to_string(),
        }
    }

    fn write(p: &str) -> ToolEffect {
        ToolEffect::FileWritten {
            path: p.to_string(),
        }
    }

    #[test]
    fn test_starts_unset() {
        let ctx = ProjectContext::new();
        assert_eq!(ctx.active(), None);
        assert_eq!(ctx.describe(), "(none)");
    }

    #[test]
    fn test_mkdir_sets_context() {
        let rules = ProjectRules::default();
        let mut ctx = ProjectContext::new();
        assert_eq!(ctx.observe(&rules, &cmd("mkdir site-foo")), Some("site-foo"));
        assert_eq!(ctx.active(), Some("site-foo"));
    }

    #[test]
    fn test_mkdir_shapes() {
        let rules = ProjectRules::default();
        assert_eq!(
            rules.created_directory("mkdir -p blog/site").as_deref(),
            Some("blog/site")
        );
        assert_eq!(
            rules.created_directory("cd /tmp && mkdir todo-app").as_deref(),
            Some("todo-app")
        );
        assert_eq!(
            rules.created_directory("echo hi; MKDIR game").as_deref(),
            Some("game")
        );
        assert_eq!(
            rules.created_directory("mkdir projects\\counter\\").as_deref(),
            Some("projects/counter")
        );
        assert_eq!(
            rules.created_directory("mkdir ./landing").as_deref(),
            Some("landing")
        );
        assert_eq!(
            rules.created_directory("mkdir -m 755 site").as_deref(),
            Some("site")
        );
        assert_eq!(
            rules.created_directory("mkdir -p -m 0700 blog").as_deref(),
            Some("blog")
        );
        assert_eq!(
            rules.created_directory("mkdir --mode=755 shop").as_deref(),
            Some("shop")
        );
        assert_eq!(
            rules.created_directory("mkdir --mode 755 docs").as_deref(),
            Some("docs")
        );
        assert_eq!(rules.created_directory("ls -la"), None);
        assert_eq!(rules.created_directory("echo mkdir foo"), None);
    }

    #[test]
    fn test_project_file_write_sets_parent() {
        let rules = ProjectRules::default();
        let mut ctx = ProjectContext::new();
        ctx.observe(&rules, &cmd("mkdir site-foo"));
        // Same directory again is not a change.
        assert_eq!(ctx.observe(&rules, &write("site-foo/index.html")), None);
        assert_eq!(ctx.active(), Some("site-foo"));

        assert_eq!(
            ctx.observe(&rules, &write("other/README.md")),
            Some("other")
        );
    }

    #[test]
    fn test_unrecognized_write_leaves_context() {
        let rules = ProjectRules::default();
        let mut ctx = ProjectContext::new();
        ctx.observe(&rules, &cmd("mkdir site-foo"));
        assert_eq!(ctx.observe(&rules, &write("elsewhere/data.json")), None);
        assert_eq!(ctx.active(), Some("site-foo"));
    }

    #[test]
    fn test_root_level_project_file_ignored() {
        let rules = ProjectRules::default();
        let mut ctx = ProjectContext::new();
        assert_eq!(ctx.observe(&rules, &write("index.html")), None);
        assert_eq!(ctx.observe(&rules, &write("/index.html")), None);
        assert_eq!(ctx.active(), None);
    }

    #[test]
    fn test_noop_update_ignored() {
        let rules = ProjectRules::default();
        let mut ctx = ProjectContext::new();
        let noop = ToolEffect::FileUpdated {
            path: "a/style.css".to_string(),
            changed: false,
        };
        assert_eq!(ctx.observe(&rules, &noop), None);

        let real = ToolEffect::FileUpdated {
            path: "a/style.css".to_string(),
            changed: true,
        };
        assert_eq!(ctx.observe(&rules, &real), Some("a"));
    }

    #[test]
    fn test_custom_project_files() {
        let rules = ProjectRules::new(vec!["App.vue".to_string()]);
        assert_eq!(rules.project_dir_of("web/app.vue").as_deref(), Some("web"));
        assert_eq!(rules.project_dir_of("web/index.html"), None);
    }
}
