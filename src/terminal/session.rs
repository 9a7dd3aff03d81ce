use crate::host::TerminalId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A live terminal session tracked under a logical name.
///
/// Clones share the `disposed_by_owner` flag, so a flag set through the
/// registry is visible to every holder of the handle.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: TerminalId,
    name: String,
    disposed_by_owner: Arc<AtomicBool>,
    created_at: DateTime<Utc>,
}

impl SessionHandle {
    pub(crate) fn new(id: TerminalId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            disposed_by_owner: Arc::new(AtomicBool::new(false)),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TerminalId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_disposed_by_owner(&self) -> bool {
        self.disposed_by_owner.load(Ordering::SeqCst)
    }

    /// Returns false if the flag was already set.
    pub(crate) fn mark_disposed_by_owner(&self) -> bool {
        !self.disposed_by_owner.swap(true, Ordering::SeqCst)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.to_string(),
            name: self.name.clone(),
            created_at_iso: self.created_at.to_rfc3339(),
            disposed_by_owner: self.is_disposed_by_owner(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub created_at_iso: String,
    pub disposed_by_owner: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn flag_is_shared_between_clones_and_set_once() {
        let handle = SessionHandle::new(Uuid::new_v4(), "build");
        let clone = handle.clone();
        assert!(!clone.is_disposed_by_owner());

        assert!(handle.mark_disposed_by_owner());
        assert!(clone.is_disposed_by_owner());
        assert!(!clone.mark_disposed_by_owner());
    }

    #[test]
    fn info_reports_identity() {
        let id = Uuid::new_v4();
        let info = SessionHandle::new(id, "tests").info();
        assert_eq!(info.id, id.to_string());
        assert_eq!(info.name, "tests");
        assert!(!info.disposed_by_owner);
    }
}
