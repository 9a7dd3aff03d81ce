//! Boundary to the editor that hosts the extension.
//!
//! The extension never renders terminals or owns documents itself. It talks to
//! the host through two traits: [`TerminalHost`] for terminal sessions and
//! [`EditorHost`] for editor, workspace and user-facing messages. Terminal
//! close notifications flow back through the channel returned by
//! [`TerminalHost::subscribe_close`].

pub mod memory;
pub mod shell;

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// Host-assigned identity of one terminal session.
pub type TerminalId = Uuid;

/// Delivered by the host whenever any terminal closes, whatever the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalClosed {
    pub id: TerminalId,
    pub name: String,
}

/// The active text editor as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorContext {
    pub file: String,
    /// Zero-based caret line.
    pub line: usize,
}

/// Terminal operations provided by the host.
///
/// Implementations must not call back into the registry from inside these
/// methods; closes are reported only through the subscription channel.
pub trait TerminalHost: Send + Sync {
    fn create_terminal(&self, name: &str) -> Result<TerminalId, AppError>;

    /// Reveals the terminal. With `preserve_focus` the editor keeps input focus.
    fn show(&self, id: TerminalId, preserve_focus: bool);

    fn scroll_to_bottom(&self, id: TerminalId);

    fn focus(&self, id: TerminalId);

    fn send_text(&self, id: TerminalId, text: &str, add_new_line: bool) -> Result<(), AppError>;

    fn dispose(&self, id: TerminalId);

    /// Hands out the close-notification stream. Only one subscriber is supported.
    fn subscribe_close(&self) -> Option<UnboundedReceiver<TerminalClosed>>;
}

/// Editor and workspace operations provided by the host.
#[async_trait]
pub trait EditorHost: Send + Sync {
    fn active_editor(&self) -> Option<EditorContext>;

    fn workspace_folders(&self) -> Vec<PathBuf>;

    /// Persists every open document. Resolves to whether all saves succeeded.
    async fn save_all(&self, include_untitled: bool) -> Result<bool, AppError>;

    fn show_warning(&self, message: &str);
}
