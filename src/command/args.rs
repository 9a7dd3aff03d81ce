use crate::error::AppError;
use serde::Deserialize;
use serde_json::Value;

/// Arguments exactly as the keybinding or caller supplied them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRunArgs {
    cmd: Option<String>,
    show_terminal: Option<bool>,
    save_all_files: Option<bool>,
    new_terminal: Option<bool>,
    focus: Option<bool>,
    terminal_name: Option<String>,
}

/// Fully defaulted options for one run of the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub cmd: String,
    pub show_terminal: bool,
    pub save_all_files: bool,
    pub new_terminal: bool,
    /// Always false when `show_terminal` is false.
    pub focus: bool,
    pub terminal_name: String,
}

impl RunOptions {
    pub fn builder(cmd: impl Into<String>, default_terminal_name: impl Into<String>) -> RunOptionsBuilder {
        RunOptionsBuilder {
            cmd: cmd.into(),
            show_terminal: true,
            save_all_files: true,
            new_terminal: false,
            focus: false,
            terminal_name: default_terminal_name.into(),
        }
    }

    /// Parses caller arguments and applies the defaults field by field.
    /// Unknown fields are ignored.
    pub fn from_value(args: Option<&Value>, default_terminal_name: &str) -> Result<Self, AppError> {
        let raw = match args {
            None | Some(Value::Null) => RawRunArgs::default(),
            Some(value @ Value::Object(_)) => RawRunArgs::deserialize(value)
                .map_err(|e| AppError::InvalidArguments(e.to_string()))?,
            Some(other) => {
                return Err(AppError::InvalidArguments(format!(
                    "expected an object, got {}",
                    other
                )))
            }
        };

        let cmd = raw
            .cmd
            .filter(|c| !c.is_empty())
            .ok_or(AppError::MissingCommand)?;

        let mut builder = RunOptions::builder(cmd, default_terminal_name);
        if let Some(v) = raw.show_terminal {
            builder = builder.show_terminal(v);
        }
        if let Some(v) = raw.save_all_files {
            builder = builder.save_all_files(v);
        }
        if let Some(v) = raw.new_terminal {
            builder = builder.new_terminal(v);
        }
        if let Some(v) = raw.focus {
            builder = builder.focus(v);
        }
        if let Some(name) = raw.terminal_name.filter(|n| !n.is_empty()) {
            builder = builder.terminal_name(name);
        }
        Ok(builder.build())
    }
}

#[derive(Debug, Clone)]
pub struct RunOptionsBuilder {
    cmd: String,
    show_terminal: bool,
    save_all_files: bool,
    new_terminal: bool,
    focus: bool,
    terminal_name: String,
}

impl RunOptionsBuilder {
    pub fn show_terminal(mut self, value: bool) -> Self {
        self.show_terminal = value;
        self
    }

    pub fn save_all_files(mut self, value: bool) -> Self {
        self.save_all_files = value;
        self
    }

    pub fn new_terminal(mut self, value: bool) -> Self {
        self.new_terminal = value;
        self
    }

    pub fn focus(mut self, value: bool) -> Self {
        self.focus = value;
        self
    }

    pub fn terminal_name(mut self, value: impl Into<String>) -> Self {
        self.terminal_name = value.into();
        self
    }

    pub fn build(self) -> RunOptions {
        RunOptions {
            cmd: self.cmd,
            show_terminal: self.show_terminal,
            save_all_files: self.save_all_files,
            new_terminal: self.new_terminal,
            // A hidden terminal is never focused.
            focus: self.focus && self.show_terminal,
            terminal_name: self.terminal_name,
        }
    }
}
