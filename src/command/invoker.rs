use crate::command::args::RunOptions;
use crate::command::template::{resolve_template, ResolutionContext};
use crate::error::AppError;
use crate::host::{EditorContext, EditorHost, TerminalHost};
use crate::terminal::{SessionHandle, TerminalRegistry};
use crate::utils::diagnostic_log::DiagnosticLog;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const COMMAND_RUN: &str = "terminalCommandKeys.run";

/// Turns a command template plus editor state into text sent to a terminal.
pub struct CommandInvoker {
    registry: Arc<TerminalRegistry>,
    terminals: Arc<dyn TerminalHost>,
    editor: Arc<dyn EditorHost>,
    diagnostics: Option<DiagnosticLog>,
    default_terminal_name: String,
}

impl CommandInvoker {
    pub fn new(
        registry: Arc<TerminalRegistry>,
        terminals: Arc<dyn TerminalHost>,
        editor: Arc<dyn EditorHost>,
        default_terminal_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            terminals,
            editor,
            diagnostics: None,
            default_terminal_name: default_terminal_name.into(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticLog) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn registry(&self) -> &Arc<TerminalRegistry> {
        &self.registry
    }

    /// Entry point of the `terminalCommandKeys.run` command.
    ///
    /// Usage problems are reported as warnings and yield `Ok(None)`.
    /// Host failures are returned as errors.
    #[instrument(skip(self, args))]
    pub async fn run(&self, args: Option<Value>) -> Result<Option<SessionHandle>, AppError> {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics
                .log_invocation(COMMAND_RUN, args.as_ref().unwrap_or(&Value::Null))
                .await;
        }

        match self.prepare(args.as_ref()) {
            Ok((editor, options)) => self.handle_invocation(editor, options).await.map(Some),
            Err(e) if e.is_usage() => {
                self.warn(&e.to_string()).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn prepare(&self, args: Option<&Value>) -> Result<(EditorContext, RunOptions), AppError> {
        let editor = self.editor.active_editor().ok_or(AppError::MissingEditor)?;
        let options = RunOptions::from_value(args, &self.default_terminal_name)?;
        Ok((editor, options))
    }

    /// Saves if requested, then resolves the template and dispatches it.
    #[instrument(skip(self, editor, options), fields(terminal = %options.terminal_name))]
    pub async fn handle_invocation(
        &self,
        editor: EditorContext,
        options: RunOptions,
    ) -> Result<SessionHandle, AppError> {
        if options.save_all_files {
            let all_saved = self.editor.save_all(false).await?;
            if !all_saved {
                debug!("Some documents were not saved");
            }
        }

        // Workspace folders are read after the save; they may have changed meanwhile.
        let ctx = ResolutionContext::from_editor(&editor, &self.editor.workspace_folders());
        let resolved = resolve_template(&options.cmd, &ctx);
        self.dispatch(&resolved, &options)
    }

    /// Sends an already resolved command to the terminal named in `options`.
    #[instrument(skip(self, options), fields(terminal = %options.terminal_name))]
    pub fn dispatch(&self, resolved: &str, options: &RunOptions) -> Result<SessionHandle, AppError> {
        let handle = self
            .registry
            .get_or_create(&options.terminal_name, options.new_terminal)?;

        if options.show_terminal {
            self.terminals.show(handle.id(), true);
            self.terminals.scroll_to_bottom(handle.id());
        }
        if options.focus {
            self.terminals.focus(handle.id());
        }
        self.terminals.send_text(handle.id(), resolved, true)?;

        info!(id = %handle.id(), command = %resolved, "Sent command to terminal");
        Ok(handle)
    }

    async fn warn(&self, message: &str) {
        let log = format!("{}: {}", COMMAND_RUN, message);
        warn!("{}", log);
        self.editor.show_warning(&log);
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.log_warning(&log).await;
        }
    }
}
