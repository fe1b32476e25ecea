//! Text edits applied to workspace files.
//!
//! `EditOperation` is the typed form of the `updateFile` tool's
//! operation/payload fields. Matching is always literal and global: every
//! occurrence of the search text is affected and no character in it has a
//! pattern meaning.

use crate::error::MutationError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Names accepted for the `operation` field, in their canonical spelling.
pub const OPERATIONS: [&str; 4] = ["append", "replace", "insertAfter", "insertBefore"];

/// A single edit applied to a file's full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOperation {
    Append { text: String },
    Replace { search: String, replacement: String },
    InsertBefore { search: String, insert: String },
    InsertAfter { search: String, insert: String },
}

/// Raw payload fields as they arrive from a tool call.
#[derive(Debug, Clone, Default)]
pub struct EditFields {
    pub search: Option<String>,
    pub replace: Option<String>,
    pub insert: Option<String>,
    pub append: Option<String>,
}

impl EditOperation {
    /// Build an operation from its name and payload. Names are matched
    /// case-insensitively.
    pub fn from_fields(operation: &str, fields: EditFields) -> Result<Self, MutationError> {
        match operation.to_lowercase().as_str() {
            "append" => {
                let text = fields.append.ok_or(MutationError::MissingField {
                    operation: "append",
                    field: "append text",
                })?;
                Ok(Self::Append { text })
            }
            "replace" => match (fields.search, fields.replace) {
                (Some(search), Some(replacement)) => Ok(Self::Replace {
                    search,
                    replacement,
                }),
                _ => Err(MutationError::MissingField {
                    operation: "replace",
                    field: "search and replace",
                }),
            },
            "insertafter" => match (fields.search, fields.insert) {
                (Some(search), Some(insert)) => Ok(Self::InsertAfter { search, insert }),
                _ => Err(MutationError::MissingField {
                    operation: "insertAfter",
                    field: "search and insert",
                }),
            },
            "insertbefore" => match (fields.search, fields.insert) {
                (Some(search), Some(insert)) => Ok(Self::InsertBefore { search, insert }),
                _ => Err(MutationError::MissingField {
                    operation: "insertBefore",
                    field: "search and insert",
                }),
            },
            _ => Err(MutationError::UnsupportedOperation(operation.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Append { .. } => "append",
            Self::Replace { .. } => "replace",
            Self::InsertBefore { .. } => "insertBefore",
            Self::InsertAfter { .. } => "insertAfter",
        }
    }

    /// Compute the edited text. Pure; does not touch the filesystem.
    pub fn apply(&self, original: &str) -> String {
        match self {
            Self::Append { text } => {
                let mut out = String::with_capacity(original.len() + text.len());
                out.push_str(original);
                out.push_str(text);
                out
            }
            Self::Replace {
                search,
                replacement,
            } => replace_literal(original, search, |_| replacement.clone()),
            Self::InsertAfter { search, insert } => {
                replace_literal(original, search, |m| format!("{}{}", m, insert))
            }
            Self::InsertBefore { search, insert } => {
                replace_literal(original, search, |m| format!("{}{}", insert, m))
            }
        }
    }
}

/// Replace every non-overlapping literal occurrence of `needle`, scanning
/// left to right. An empty needle matches nothing.
fn replace_literal<F>(haystack: &str, needle: &str, mut with: F) -> String
where
    F: FnMut(&str) -> String,
{
    if needle.is_empty() {
        return haystack.to_string();
    }
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (start, matched) in haystack.match_indices(needle) {
        out.push_str(&haystack[last..start]);
        out.push_str(&with(matched));
        last = start + matched.len();
    }
    out.push_str(&haystack[last..]);
    out
}

/// Outcome of a successful `update_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// False when the edit produced identical content and no write happened.
    pub changed: bool,
    /// True when the file did not exist and was created empty first.
    pub created: bool,
}

/// Apply `op` to the file at `path`, creating it empty if absent.
///
/// Identical output skips the write entirely, so the file's modification
/// time is left untouched.
pub fn update_file(path: &Path, op: &EditOperation) -> Result<UpdateOutcome, MutationError> {
    let io_err = |source| MutationError::Io {
        path: path.display().to_string(),
        source,
    };

    let (original, created) = match fs::read_to_string(path) {
        Ok(content) => (content, false),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            write_durable(path, "").map_err(io_err)?;
            (String::new(), true)
        }
        Err(e) => return Err(io_err(e)),
    };

    let updated = op.apply(&original);
    if updated == original {
        return Ok(UpdateOutcome {
            changed: false,
            created,
        });
    }

    write_durable(path, &updated).map_err(io_err)?;
    Ok(UpdateOutcome {
        changed: true,
        created,
    })
}

/// Write `content` to `path` through a synced temp file in the same
/// directory, then rename it into place.
pub fn write_durable(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    // Temp files are created 0600; keep the target readable like a plain write would.
    match fs::metadata(path) {
        Ok(meta) => tmp.as_file().set_permissions(meta.permissions())?,
        Err(_) => set_default_permissions(tmp.as_file())?,
    }
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_default_permissions(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}
