use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("There must be an active editor.")]
    MissingEditor,

    #[error("Keybinding must include a \"args.cmd\" key")]
    MissingCommand,

    #[error("Invalid command arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Failed to create terminal '{name}': {reason}")]
    TerminalCreate { name: String, reason: String },

    #[error("Failed to send text to terminal {id}: {reason}")]
    TerminalSend { id: String, reason: String },

    #[error("Terminal not found: {0}")]
    TerminalNotFound(String),

    #[error("Saving open documents failed: {0}")]
    SaveFailed(String),
}

impl AppError {
    /// Errors caused by how the command was invoked rather than by the host.
    /// These are reported as warnings and abort the invocation without side effects.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            AppError::MissingEditor | AppError::MissingCommand | AppError::InvalidArguments(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_are_classified() {
        assert!(AppError::MissingEditor.is_usage());
        assert!(AppError::MissingCommand.is_usage());
        assert!(AppError::InvalidArguments("showTerminal".into()).is_usage());
        assert!(!AppError::SaveFailed("disk full".into()).is_usage());
        assert!(!AppError::TerminalNotFound("x".into()).is_usage());
    }

    #[test]
    fn missing_command_message_matches_keybinding_hint() {
        assert_eq!(
            AppError::MissingCommand.to_string(),
            "Keybinding must include a \"args.cmd\" key"
        );
    }
}
