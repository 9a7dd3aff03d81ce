use crate::error::AppError;
use crate::host::{TerminalClosed, TerminalHost, TerminalId};
use crate::terminal::session::SessionHandle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// How a close notification was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The user closed a tracked terminal; its entry was removed.
    UserClosed,
    /// Close of a terminal the registry is disposing itself; nothing to do.
    OwnerDisposed,
    /// Not a terminal this registry currently tracks.
    Untracked,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<String, SessionHandle>,
}

/// Tracks at most one live terminal per logical name.
///
/// A terminal can go away two ways: the registry disposes it, or the user
/// closes it in the host. The host reports both through the same close
/// notification, possibly after the registry has already registered a
/// replacement under the same name. Notifications are therefore matched by
/// identity, and the owner flag is set before the host is asked to dispose.
/// The lock is released while the host disposes, so a close notification
/// handled in that window sees the flag and leaves the entry alone.
pub struct TerminalRegistry {
    host: Arc<dyn TerminalHost>,
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for TerminalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl TerminalRegistry {
    pub fn new(host: Arc<dyn TerminalHost>) -> Self {
        Self {
            host,
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the live terminal for `name`, creating it if needed.
    /// With `force_new`, an existing terminal is disposed and replaced.
    #[instrument(skip(self))]
    pub fn get_or_create(&self, name: &str, force_new: bool) -> Result<SessionHandle, AppError> {
        if force_new {
            self.dispose(name);
        }

        let mut state = self.lock();
        // A flagged entry is mid-disposal and gets replaced.
        if let Some(existing) = state
            .sessions
            .get(name)
            .filter(|handle| !handle.is_disposed_by_owner())
        {
            debug!(terminal = %name, id = %existing.id(), "Reusing terminal");
            return Ok(existing.clone());
        }

        let id = self.host.create_terminal(name)?;
        let handle = SessionHandle::new(id, name);
        state.sessions.insert(name.to_string(), handle.clone());
        info!(terminal = %name, id = %id, "Created terminal");
        Ok(handle)
    }

    /// Disposes the terminal registered under `name`. Returns false if there was none.
    #[instrument(skip(self))]
    pub fn dispose(&self, name: &str) -> bool {
        let handle = {
            let state = self.lock();
            match state.sessions.get(name) {
                // The flag must be visible before the host starts tearing the terminal down.
                Some(handle) if handle.mark_disposed_by_owner() => handle.clone(),
                _ => return false,
            }
        };

        self.host.dispose(handle.id());
        self.remove_if_current(name, handle.id());

        info!(terminal = %name, id = %handle.id(), "Disposed terminal");
        true
    }

    /// Disposes every tracked terminal. Returns how many were disposed.
    #[instrument(skip(self))]
    pub fn dispose_all(&self) -> usize {
        let names = self.names();
        let disposed = names.iter().filter(|name| self.dispose(name)).count();
        info!(count = disposed, "Disposed all terminals");
        disposed
    }

    /// Applies a close notification from the host.
    #[instrument(skip(self), fields(terminal = %closed.name, id = %closed.id))]
    pub fn handle_close(&self, closed: &TerminalClosed) -> CloseOutcome {
        let mut state = self.lock();
        match state.sessions.get(&closed.name) {
            Some(handle) if handle.id() == closed.id => {
                if handle.is_disposed_by_owner() {
                    debug!("Ignoring close of terminal being disposed by the registry");
                    return CloseOutcome::OwnerDisposed;
                }
                state.sessions.remove(&closed.name);
                info!("Terminal closed by user");
                CloseOutcome::UserClosed
            }
            _ => {
                debug!("Close notification for untracked terminal");
                CloseOutcome::Untracked
            }
        }
    }

    fn remove_if_current(&self, name: &str, id: TerminalId) {
        let mut state = self.lock();
        if state.sessions.get(name).map(|h| h.id()) == Some(id) {
            state.sessions.remove(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<SessionHandle> {
        self.lock().sessions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().sessions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn sessions(&self) -> Vec<SessionHandle> {
        let mut sessions: Vec<SessionHandle> = self.lock().sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.name().cmp(b.name()));
        sessions
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }
}
