//! In-memory host that records every call. Used to embed the extension without
//! a real editor and to observe the extension's behavior in tests.

use crate::error::AppError;
use crate::host::{EditorContext, EditorHost, TerminalClosed, TerminalHost, TerminalId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Create { id: TerminalId, name: String },
    Show { id: TerminalId, preserve_focus: bool },
    ScrollToBottom(TerminalId),
    Focus(TerminalId),
    SendText { id: TerminalId, text: String, add_new_line: bool },
    Dispose(TerminalId),
    SaveAll,
}

#[derive(Debug)]
pub struct MemoryHost {
    calls: Mutex<Vec<HostCall>>,
    live: Mutex<HashMap<TerminalId, String>>,
    close_tx: UnboundedSender<TerminalClosed>,
    close_rx: Mutex<Option<UnboundedReceiver<TerminalClosed>>>,
    editor: Mutex<Option<EditorContext>>,
    folders: Mutex<Vec<PathBuf>>,
    warnings: Mutex<Vec<String>>,
    echo_on_dispose: AtomicBool,
    fail_create: AtomicBool,
    fail_send: AtomicBool,
    fail_save: AtomicBool,
    hold_save: AtomicBool,
    save_gate: Notify,
    save_started: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        let (close_tx, close_rx) = mpsc::unbounded_channel();
        Self {
            calls: Mutex::new(Vec::new()),
            live: Mutex::new(HashMap::new()),
            close_tx,
            close_rx: Mutex::new(Some(close_rx)),
            editor: Mutex::new(None),
            folders: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            echo_on_dispose: AtomicBool::new(true),
            fail_create: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            fail_save: AtomicBool::new(false),
            hold_save: AtomicBool::new(false),
            save_gate: Notify::new(),
            save_started: Notify::new(),
        }
    }

    pub fn set_active_editor(&self, editor: Option<EditorContext>) {
        *lock(&self.editor) = editor;
    }

    pub fn set_workspace_folders(&self, folders: Vec<PathBuf>) {
        *lock(&self.folders) = folders;
    }

    /// Whether disposing a terminal emits a close notification, as real hosts do.
    pub fn echo_on_dispose(&self, enabled: bool) {
        self.echo_on_dispose.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_create(&self, enabled: bool) {
        self.fail_create.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_send(&self, enabled: bool) {
        self.fail_send.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_save(&self, enabled: bool) {
        self.fail_save.store(enabled, Ordering::SeqCst);
    }

    /// Makes `save_all` wait until [`MemoryHost::release_save`] is called.
    pub fn hold_save(&self) {
        self.hold_save.store(true, Ordering::SeqCst);
    }

    pub fn release_save(&self) {
        self.hold_save.store(false, Ordering::SeqCst);
        self.save_gate.notify_waiters();
    }

    /// Resolves once a held `save_all` has started waiting.
    pub async fn save_started(&self) {
        self.save_started.notified().await;
    }

    /// Simulates the user closing a terminal in the host UI.
    pub fn close_by_user(&self, id: TerminalId) -> bool {
        let Some(name) = lock(&self.live).remove(&id) else {
            return false;
        };
        let _ = self.close_tx.send(TerminalClosed { id, name });
        true
    }

    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }

    pub fn created_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, HostCall::Create { .. }))
            .count()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                HostCall::SendText { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn live_terminals(&self) -> Vec<(TerminalId, String)> {
        lock(&self.live)
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        lock(&self.warnings).clone()
    }

    fn record(&self, call: HostCall) {
        lock(&self.calls).push(call);
    }
}

impl TerminalHost for MemoryHost {
    fn create_terminal(&self, name: &str) -> Result<TerminalId, AppError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::TerminalCreate {
                name: name.to_string(),
                reason: "creation disabled".to_string(),
            });
        }
        let id = Uuid::new_v4();
        lock(&self.live).insert(id, name.to_string());
        self.record(HostCall::Create {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    fn show(&self, id: TerminalId, preserve_focus: bool) {
        self.record(HostCall::Show { id, preserve_focus });
    }

    fn scroll_to_bottom(&self, id: TerminalId) {
        self.record(HostCall::ScrollToBottom(id));
    }

    fn focus(&self, id: TerminalId) {
        self.record(HostCall::Focus(id));
    }

    fn send_text(&self, id: TerminalId, text: &str, add_new_line: bool) -> Result<(), AppError> {
        if self.fail_send.load(Ordering::SeqCst) || !lock(&self.live).contains_key(&id) {
            return Err(AppError::TerminalSend {
                id: id.to_string(),
                reason: "terminal is not accepting input".to_string(),
            });
        }
        self.record(HostCall::SendText {
            id,
            text: text.to_string(),
            add_new_line,
        });
        Ok(())
    }

    fn dispose(&self, id: TerminalId) {
        self.record(HostCall::Dispose(id));
        let removed = lock(&self.live).remove(&id);
        if let Some(name) = removed {
            if self.echo_on_dispose.load(Ordering::SeqCst) {
                let _ = self.close_tx.send(TerminalClosed { id, name });
            }
        }
    }

    fn subscribe_close(&self) -> Option<UnboundedReceiver<TerminalClosed>> {
        lock(&self.close_rx).take()
    }
}

#[async_trait]
impl EditorHost for MemoryHost {
    fn active_editor(&self) -> Option<EditorContext> {
        lock(&self.editor).clone()
    }

    fn workspace_folders(&self) -> Vec<PathBuf> {
        lock(&self.folders).clone()
    }

    async fn save_all(&self, _include_untitled: bool) -> Result<bool, AppError> {
        self.record(HostCall::SaveAll);
        if self.hold_save.load(Ordering::SeqCst) {
            let released = self.save_gate.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            self.save_started.notify_one();
            if self.hold_save.load(Ordering::SeqCst) {
                released.await;
            }
        }
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(AppError::SaveFailed("document is read-only".to_string()));
        }
        Ok(true)
    }

    fn show_warning(&self, message: &str) {
        lock(&self.warnings).push(message.to_string());
    }
}
