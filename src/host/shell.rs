//! Headless host backing each terminal with a shell child process.
//!
//! Everything the host would normally render is written to stdout as JSON
//! lines: terminal output of visible terminals and user-facing warnings.

use crate::config::Config;
use crate::error::AppError;
use crate::host::{EditorContext, EditorHost, TerminalClosed, TerminalHost, TerminalId};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio as StdProcessStdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, RwLock as StdRwLock};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command as TokioCommand};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes one JSON line to stdout.
pub fn emit(value: &serde_json::Value) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", value).and_then(|_| stdout.flush()) {
        error!(error = %e, "Failed to write to stdout");
    }
}

#[derive(Debug)]
struct TerminalOutput {
    name: String,
    visible: AtomicBool,
    hidden: StdMutex<VecDeque<String>>,
    capacity: usize,
}

impl TerminalOutput {
    fn output_line(&self, line: &str) -> serde_json::Value {
        json!({"type": "output", "terminal": self.name, "line": line})
    }

    fn push(&self, line: String) {
        let mut hidden = lock(&self.hidden);
        if self.visible.load(Ordering::SeqCst) {
            drop(hidden);
            emit(&self.output_line(&line));
            return;
        }
        if hidden.len() == self.capacity {
            hidden.pop_front();
        }
        if self.capacity > 0 {
            hidden.push_back(line);
        }
    }

    fn reveal(&self) {
        let buffered: Vec<String> = {
            let mut hidden = lock(&self.hidden);
            self.visible.store(true, Ordering::SeqCst);
            hidden.drain(..).collect()
        };
        for line in buffered {
            emit(&self.output_line(&line));
        }
    }
}

#[derive(Debug)]
struct ShellTerminal {
    name: String,
    pid: Option<u32>,
    input_tx: UnboundedSender<String>,
    kill_tx: StdMutex<Option<oneshot::Sender<()>>>,
    output: Arc<TerminalOutput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveTerminal {
    pub id: String,
    pub name: String,
    pub pid: Option<u32>,
    pub visible: bool,
    pub focused: bool,
}

const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

type TerminalMap = Arc<StdMutex<HashMap<TerminalId, Arc<ShellTerminal>>>>;

#[derive(Debug)]
pub struct ShellHost {
    config: Arc<Config>,
    terminals: TerminalMap,
    close_tx: UnboundedSender<TerminalClosed>,
    close_rx: StdMutex<Option<UnboundedReceiver<TerminalClosed>>>,
    editor: StdRwLock<Option<EditorContext>>,
    focused: StdMutex<Option<TerminalId>>,
}

impl ShellHost {
    pub fn new(config: Arc<Config>) -> Self {
        let (close_tx, close_rx) = mpsc::unbounded_channel();
        Self {
            config,
            terminals: Arc::new(StdMutex::new(HashMap::new())),
            close_tx,
            close_rx: StdMutex::new(Some(close_rx)),
            editor: StdRwLock::new(None),
            focused: StdMutex::new(None),
        }
    }

    pub fn set_active_editor(&self, editor: Option<EditorContext>) {
        let mut guard = self
            .editor
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = editor;
    }

    /// Kills every terminal named `name` the way a user closing its tab would.
    /// Returns how many were closed.
    #[instrument(skip(self))]
    pub fn close_terminal_by_user(&self, name: &str) -> usize {
        let matching: Vec<(TerminalId, Arc<ShellTerminal>)> = lock(&self.terminals)
            .iter()
            .filter(|(_, t)| t.name == name)
            .map(|(id, t)| (*id, t.clone()))
            .collect();
        for (id, terminal) in &matching {
            info!(id = %id, "User closed terminal");
            kill(terminal);
        }
        matching.len()
    }

    pub fn live_terminals(&self) -> Vec<LiveTerminal> {
        let focused = *lock(&self.focused);
        let mut live: Vec<LiveTerminal> = lock(&self.terminals)
            .iter()
            .map(|(id, t)| LiveTerminal {
                id: id.to_string(),
                name: t.name.clone(),
                pid: t.pid,
                visible: t.output.visible.load(Ordering::SeqCst),
                focused: focused == Some(*id),
            })
            .collect();
        live.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        live
    }

    fn terminal(&self, id: TerminalId) -> Option<Arc<ShellTerminal>> {
        lock(&self.terminals).get(&id).cloned()
    }
}

fn kill(terminal: &ShellTerminal) {
    if let Some(kill_tx) = lock(&terminal.kill_tx).take() {
        let _ = kill_tx.send(());
    }
}

fn spawn_reader<R>(reader: R, output: Arc<TerminalOutput>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            output.push(line);
        }
    })
}

fn spawn_writer(mut stdin: ChildStdin, mut input_rx: UnboundedReceiver<String>, id: TerminalId) {
    tokio::spawn(async move {
        while let Some(text) = input_rx.recv().await {
            let written = async {
                stdin.write_all(text.as_bytes()).await?;
                stdin.flush().await
            };
            if let Err(e) = written.await {
                warn!(id = %id, error = %e, "Failed to write to terminal");
                break;
            }
        }
    });
}

impl TerminalHost for ShellHost {
    #[instrument(skip(self))]
    fn create_terminal(&self, name: &str) -> Result<TerminalId, AppError> {
        let id = Uuid::new_v4();
        let mut command_process = TokioCommand::new(&self.config.shell);
        if let Some(root) = self.config.workspace_folders.first() {
            command_process.current_dir(root);
        }
        command_process.stdin(StdProcessStdio::piped());
        command_process.stdout(StdProcessStdio::piped());
        command_process.stderr(StdProcessStdio::piped());
        command_process.kill_on_drop(true);

        debug!(shell = %self.config.shell, "Spawning shell");
        let mut child = command_process.spawn().map_err(|e| {
            error!(error = %e, shell = %self.config.shell, "Failed to spawn shell");
            AppError::TerminalCreate {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;

        let missing_pipe = |pipe: &str| AppError::TerminalCreate {
            name: name.to_string(),
            reason: format!("{} was not captured", pipe),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let output = Arc::new(TerminalOutput {
            name: name.to_string(),
            visible: AtomicBool::new(false),
            hidden: StdMutex::new(VecDeque::new()),
            capacity: self.config.hidden_output_lines,
        });
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let pid = child.id();

        lock(&self.terminals).insert(
            id,
            Arc::new(ShellTerminal {
                name: name.to_string(),
                pid,
                input_tx,
                kill_tx: StdMutex::new(Some(kill_tx)),
                output: output.clone(),
            }),
        );

        spawn_writer(stdin, input_rx, id);
        let stdout_task = spawn_reader(stdout, output.clone());
        let stderr_task = spawn_reader(stderr, output);

        let terminals = self.terminals.clone();
        let close_tx = self.close_tx.clone();
        let terminal_name = name.to_string();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    if let Err(e) = child.start_kill() {
                        warn!(id = %id, error = %e, "Failed to kill shell");
                    }
                    child.wait().await
                }
            };
            // Background jobs left behind by the shell can hold the pipes open.
            let drained = timeout(READER_DRAIN_TIMEOUT, async {
                let _ = tokio::join!(stdout_task, stderr_task);
            })
            .await;
            if drained.is_err() {
                debug!(id = %id, "Output still open after shell exit; not waiting for it");
            }

            match status {
                Ok(status) => info!(id = %id, terminal = %terminal_name, exit_code = ?status.code(), "Shell exited"),
                Err(e) => warn!(id = %id, terminal = %terminal_name, error = %e, "Failed to wait for shell"),
            }
            lock(&terminals).remove(&id);
            let _ = close_tx.send(TerminalClosed {
                id,
                name: terminal_name,
            });
        });

        info!(id = %id, pid = ?pid, "Terminal created");
        Ok(id)
    }

    fn show(&self, id: TerminalId, preserve_focus: bool) {
        if let Some(terminal) = self.terminal(id) {
            terminal.output.reveal();
            if !preserve_focus {
                *lock(&self.focused) = Some(id);
            }
        }
    }

    fn scroll_to_bottom(&self, id: TerminalId) {
        // Output is streamed as it arrives; there is no scrollback to move.
        trace!(id = %id, "Scroll to bottom");
    }

    fn focus(&self, id: TerminalId) {
        if self.terminal(id).is_some() {
            *lock(&self.focused) = Some(id);
            debug!(id = %id, "Focused terminal");
        }
    }

    fn send_text(&self, id: TerminalId, text: &str, add_new_line: bool) -> Result<(), AppError> {
        let terminal = self
            .terminal(id)
            .ok_or_else(|| AppError::TerminalNotFound(id.to_string()))?;
        let mut payload = text.to_string();
        if add_new_line {
            payload.push('\n');
        }
        terminal
            .input_tx
            .send(payload)
            .map_err(|_| AppError::TerminalSend {
                id: id.to_string(),
                reason: "terminal input is closed".to_string(),
            })
    }

    fn dispose(&self, id: TerminalId) {
        if let Some(terminal) = self.terminal(id) {
            kill(&terminal);
        }
        let mut focused = lock(&self.focused);
        if *focused == Some(id) {
            *focused = None;
        }
    }

    fn subscribe_close(&self) -> Option<UnboundedReceiver<TerminalClosed>> {
        lock(&self.close_rx).take()
    }
}

#[async_trait]
impl EditorHost for ShellHost {
    fn active_editor(&self) -> Option<EditorContext> {
        self.editor
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn workspace_folders(&self) -> Vec<PathBuf> {
        self.config.workspace_folders.clone()
    }

    async fn save_all(&self, _include_untitled: bool) -> Result<bool, AppError> {
        debug!("No open documents to save");
        Ok(true)
    }

    fn show_warning(&self, message: &str) {
        emit(&json!({"type": "warning", "message": message}));
    }
}
