use crate::host::EditorContext;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::PathBuf;

/// Rendered for `${workspaceRoot}` when no workspace folder is open.
pub const UNDEFINED_WORKSPACE_ROOT: &str = "undefined";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(line|relativeFile|file|workspaceRoot)\}").expect("placeholder pattern is valid")
});

/// Values available to a command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
    pub file: String,
    /// One-based caret line.
    pub line: usize,
    pub workspace_root: Option<String>,
}

impl ResolutionContext {
    /// Derives the context from the active editor and the open workspace folders.
    /// Only the first folder counts as the workspace root.
    pub fn from_editor(editor: &EditorContext, workspace_folders: &[PathBuf]) -> Self {
        Self {
            file: editor.file.clone(),
            line: editor.line + 1,
            workspace_root: workspace_folders
                .first()
                .map(|root| root.to_string_lossy().into_owned()),
        }
    }

    /// The file path with the workspace root stripped, prefixed with `.`.
    pub fn relative_file(&self) -> String {
        let stripped = self
            .workspace_root
            .as_deref()
            .and_then(|root| self.file.strip_prefix(root))
            .unwrap_or(&self.file);
        format!(".{}", stripped)
    }
}

/// Substitutes every recognized placeholder in one pass.
///
/// Unrecognized `${...}` sequences are left as they are, and substituted
/// values are never scanned again.
pub fn resolve_template(template: &str, ctx: &ResolutionContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "line" => ctx.line.to_string(),
            "relativeFile" => ctx.relative_file(),
            "file" => ctx.file.clone(),
            "workspaceRoot" => ctx
                .workspace_root
                .clone()
                .unwrap_or_else(|| UNDEFINED_WORKSPACE_ROOT.to_string()),
            other => format!("${{{}}}", other),
        })
        .into_owned()
}
