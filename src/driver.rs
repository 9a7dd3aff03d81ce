//! JSON-lines request protocol that drives the extension from the shell host.

use crate::extension::Extension;
use crate::host::shell::ShellHost;
use crate::host::EditorContext;
use crate::terminal::SessionInfo;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

fn first_line() -> usize {
    1
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostRequest {
    /// Makes `file` the active editor with the caret on `line` (one-based).
    OpenEditor {
        file: String,
        #[serde(default = "first_line")]
        line: usize,
    },
    CloseEditor,
    ExecuteCommand {
        command: String,
        #[serde(default)]
        args: Option<Value>,
    },
    /// Closes terminals the way a user would, bypassing the extension.
    CloseTerminal { name: String },
    ListTerminals,
}

pub struct Driver {
    host: Arc<ShellHost>,
    extension: Extension,
}

impl Driver {
    pub fn new(host: Arc<ShellHost>, extension: Extension) -> Self {
        Self { host, extension }
    }

    /// Handles one request line and returns the response to emit.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<HostRequest>(line) {
            Ok(request) => Some(self.handle(request).await),
            Err(e) => {
                debug!(error = %e, "Malformed request");
                Some(json!({"type": "error", "message": format!("Invalid request: {}", e)}))
            }
        }
    }

    pub async fn handle(&self, request: HostRequest) -> Value {
        match request {
            HostRequest::OpenEditor { file, line } => {
                self.host.set_active_editor(Some(EditorContext {
                    file,
                    line: line.saturating_sub(1),
                }));
                json!({"type": "ok"})
            }
            HostRequest::CloseEditor => {
                self.host.set_active_editor(None);
                json!({"type": "ok"})
            }
            HostRequest::ExecuteCommand { command, args } => {
                match self.extension.execute_command(&command, args).await {
                    Ok(Some(handle)) => json!({"type": "executed", "terminal": handle.info()}),
                    Ok(None) => json!({"type": "skipped"}),
                    Err(e) => {
                        error!(command = %command, error = %e, "Command failed");
                        json!({"type": "error", "message": e.to_string()})
                    }
                }
            }
            HostRequest::CloseTerminal { name } => {
                let count = self.host.close_terminal_by_user(&name);
                json!({"type": "closed", "count": count})
            }
            HostRequest::ListTerminals => {
                let tracked: Vec<SessionInfo> = self
                    .extension
                    .registry()
                    .sessions()
                    .iter()
                    .map(|s| s.info())
                    .collect();
                json!({
                    "type": "terminals",
                    "tracked": tracked,
                    "live": self.host.live_terminals(),
                })
            }
        }
    }

    /// Deactivates the extension, disposing every tracked terminal.
    pub fn shutdown(self) -> usize {
        self.extension.deactivate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn driver(dir: &std::path::Path) -> Driver {
        let config = Config {
            shell: "/bin/sh".to_string(),
            diagnostic_log_file: dir.join("diagnostic.log"),
            ..Config::default()
        };
        let host = Arc::new(ShellHost::new(Arc::new(config.clone())));
        let extension = Extension::activate(host.clone(), host.clone(), &config);
        Driver::new(host, extension)
    }

    #[test]
    fn requests_parse_with_defaults() {
        let req: HostRequest = serde_json::from_str(r#"{"type":"openEditor","file":"/a.rs"}"#).unwrap();
        assert_eq!(
            req,
            HostRequest::OpenEditor {
                file: "/a.rs".into(),
                line: 1
            }
        );
        let req: HostRequest =
            serde_json::from_str(r#"{"type":"executeCommand","command":"terminalCommandKeys.run"}"#).unwrap();
        assert_eq!(
            req,
            HostRequest::ExecuteCommand {
                command: "terminalCommandKeys.run".into(),
                args: None
            }
        );
    }

    #[tokio::test]
    async fn malformed_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(dir.path());
        assert!(driver.handle_line("   ").await.is_none());
        let response = driver.handle_line("{not json").await.unwrap();
        assert_eq!(response["type"], "error");
    }

    #[tokio::test]
    async fn run_without_editor_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(dir.path());
        let response = driver
            .handle_line(r#"{"type":"executeCommand","command":"terminalCommandKeys.run","args":{"cmd":"ls"}}"#)
            .await
            .unwrap();
        assert_eq!(response["type"], "skipped");
        assert_eq!(driver.shutdown(), 0);
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(dir.path());
        let response = driver
            .handle_line(r#"{"type":"executeCommand","command":"other.run"}"#)
            .await
            .unwrap();
        assert_eq!(response["type"], "error");
        assert!(response["message"].as_str().unwrap().contains("other.run"));
    }

    #[tokio::test]
    async fn run_creates_tracked_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(dir.path());
        driver
            .handle_line(r#"{"type":"openEditor","file":"/tmp/a.txt","line":3}"#)
            .await;
        let response = driver
            .handle_line(
                r#"{"type":"executeCommand","command":"terminalCommandKeys.run","args":{"cmd":"true ${line}","terminalName":"t1","showTerminal":false}}"#,
            )
            .await
            .unwrap();
        assert_eq!(response["type"], "executed");
        assert_eq!(response["terminal"]["name"], "t1");

        let listing = driver.handle_line(r#"{"type":"listTerminals"}"#).await.unwrap();
        assert_eq!(listing["tracked"].as_array().unwrap().len(), 1);
        assert_eq!(listing["live"].as_array().unwrap().len(), 1);
        assert_eq!(listing["live"][0]["visible"], false);

        assert_eq!(driver.shutdown(), 1);
    }
}
