use crate::command::{CommandInvoker, COMMAND_RUN};
use crate::config::Config;
use crate::error::AppError;
use crate::host::{EditorHost, TerminalHost};
use crate::terminal::{SessionHandle, TerminalRegistry};
use crate::utils::diagnostic_log::DiagnosticLog;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// An activated extension: the registered command plus the close listener.
pub struct Extension {
    invoker: Arc<CommandInvoker>,
    registry: Arc<TerminalRegistry>,
    close_listener: Option<JoinHandle<()>>,
}

impl Extension {
    /// Registers the command and subscribes to terminal close notifications.
    /// Must be called from within a tokio runtime.
    #[instrument(skip_all)]
    pub fn activate(
        terminals: Arc<dyn TerminalHost>,
        editor: Arc<dyn EditorHost>,
        config: &Config,
    ) -> Self {
        let registry = Arc::new(TerminalRegistry::new(terminals.clone()));
        let invoker = CommandInvoker::new(
            registry.clone(),
            terminals.clone(),
            editor,
            config.default_terminal_name.clone(),
        )
        .with_diagnostics(DiagnosticLog::new(config));

        let close_listener = match terminals.subscribe_close() {
            Some(mut closed_rx) => {
                let registry = registry.clone();
                Some(tokio::spawn(async move {
                    while let Some(closed) = closed_rx.recv().await {
                        let outcome = registry.handle_close(&closed);
                        debug!(terminal = %closed.name, id = %closed.id, ?outcome, "Handled terminal close");
                    }
                }))
            }
            None => {
                warn!("Close notifications already subscribed elsewhere; user-closed terminals will not be noticed");
                None
            }
        };

        info!(command = COMMAND_RUN, "Extension activated");
        Self {
            invoker: Arc::new(invoker),
            registry,
            close_listener,
        }
    }

    pub fn registry(&self) -> &Arc<TerminalRegistry> {
        &self.registry
    }

    pub fn invoker(&self) -> &Arc<CommandInvoker> {
        &self.invoker
    }

    /// Executes a registered command by id.
    #[instrument(skip(self, args))]
    pub async fn execute_command(
        &self,
        command_id: &str,
        args: Option<Value>,
    ) -> Result<Option<SessionHandle>, AppError> {
        match command_id {
            COMMAND_RUN => self.invoker.run(args).await,
            _ => Err(AppError::UnknownCommand(command_id.to_string())),
        }
    }

    /// Disposes every tracked terminal and stops listening for closes.
    /// Returns the number of terminals disposed.
    #[instrument(skip_all)]
    pub fn deactivate(mut self) -> usize {
        let disposed = self.registry.dispose_all();
        if let Some(listener) = self.close_listener.take() {
            listener.abort();
        }
        info!(disposed, "Extension deactivated");
        disposed
    }
}

impl Drop for Extension {
    fn drop(&mut self) {
        if let Some(listener) = self.close_listener.take() {
            listener.abort();
        }
    }
}
