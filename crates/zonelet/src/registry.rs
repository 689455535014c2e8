//! # Workload Registry
//!
//! The single source of truth for workload state on this node.
//!
//! Uses DashMap so registrations and transitions of unrelated ids never contend
//! on a global lock. Every operation completes under one shard guard, so no
//! caller observes a half-updated entry.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::workload::RuntimeHandle;
use crate::workload::WorkloadEntry;
use crate::workload::WorkloadId;
use crate::workload::WorkloadSpec;
use crate::workload::WorkloadState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Duplicate(WorkloadId),
    NotFound(WorkloadId),
    InvalidTransition {
        id: WorkloadId,
        from: WorkloadState,
        to: WorkloadState,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate(id) => write!(f, "Workload already registered: {}", id),
            Self::NotFound(id) => write!(f, "Workload not found: {}", id),
            Self::InvalidTransition { id, from, to } => {
                write!(f, "Invalid transition for {}: {} -> {}", id, from, to)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Fallback text so a `Failed` entry always carries a non-empty error.
const UNSPECIFIED_FAILURE: &str = "unspecified failure";

/// In-memory workload registry. Owned by whoever constructs the dispatcher;
/// there is no process-wide instance.
#[derive(Default)]
pub struct Registry {
    entries: DashMap<WorkloadId, WorkloadEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a `Pending` entry for `spec.id`.
    ///
    /// At most one of any number of concurrent registrations of the same id wins.
    pub fn register(&self, spec: WorkloadSpec) -> Result<WorkloadEntry> {
        let id = WorkloadId::new(spec.id.clone());
        match self.entries.entry(id.clone()) {
            Entry::Occupied(_) => Err(Error::Duplicate(id)),
            Entry::Vacant(slot) => {
                let entry = WorkloadEntry::pending(spec);
                slot.insert(entry.clone());
                debug!(workload_id = %id, "registered workload");
                Ok(entry)
            }
        }
    }

    /// Returns a snapshot of the entry.
    pub fn get(&self, id: &WorkloadId) -> Result<WorkloadEntry> {
        self.entries
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Moves an entry to `to`.
    ///
    /// - `handle` is attached only if none is recorded yet.
    /// - `error` is recorded only when `to` is `Failed`; a missing or empty
    ///   error is replaced with a generic description.
    pub fn transition(
        &self,
        id: &WorkloadId,
        to: WorkloadState,
        handle: Option<RuntimeHandle>,
        error: Option<String>,
    ) -> Result<WorkloadEntry> {
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        let from = entry.state;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition { id: id.clone(), from, to });
        }

        if entry.handle.is_none() {
            entry.handle = handle;
        }
        if to == WorkloadState::Failed {
            let error = error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| UNSPECIFIED_FAILURE.to_string());
            entry.last_error = Some(error);
        }
        entry.state = to;

        debug!(workload_id = %id, %from, %to, "workload transitioned");
        Ok(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn spec(id: &str) -> WorkloadSpec {
        WorkloadSpec::new(id, "x", "edera-zone")
    }

    fn handle() -> RuntimeHandle {
        RuntimeHandle { sandbox_id: "sb-1".into(), container_id: "ctr-1".into() }
    }

    #[test]
    fn test_register_creates_pending_entry() {
        let registry = Registry::new();
        let entry = registry.register(spec("wl-1")).unwrap();

        assert_eq!(entry.state, WorkloadState::Pending);
        assert!(entry.handle.is_none());
        assert!(entry.last_error.is_none());
        assert_eq!(registry.get(&"wl-1".into()).unwrap(), entry);
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let registry = Registry::new();
        registry.register(spec("wl-1")).unwrap();

        let mut other = spec("wl-1");
        other.image = "y".into();
        assert_eq!(registry.register(other), Err(Error::Duplicate("wl-1".into())));
        assert_eq!(registry.get(&"wl-1".into()).unwrap().spec.image, "x");
    }

    #[test]
    fn test_get_unknown_id() {
        let registry = Registry::new();
        assert_eq!(registry.get(&"nope".into()), Err(Error::NotFound("nope".into())));
    }

    #[test]
    fn test_transition_attaches_handle_once() {
        let registry = Registry::new();
        let id = WorkloadId::from("wl-1");
        registry.register(spec("wl-1")).unwrap();

        let entry = registry.transition(&id, WorkloadState::Running, Some(handle()), None).unwrap();
        assert_eq!(entry.handle, Some(handle()));

        let other = RuntimeHandle { sandbox_id: "sb-2".into(), container_id: "ctr-2".into() };
        let entry = registry.transition(&id, WorkloadState::Succeeded, Some(other), None).unwrap();
        assert_eq!(entry.handle, Some(handle()));
        assert!(entry.last_error.is_none());
    }

    #[test]
    fn test_failed_always_has_error() {
        let registry = Registry::new();
        registry.register(spec("a")).unwrap();
        registry.register(spec("b")).unwrap();

        let a = registry.transition(&"a".into(), WorkloadState::Failed, None, Some("boom".into())).unwrap();
        assert_eq!(a.last_error.as_deref(), Some("boom"));

        let b = registry.transition(&"b".into(), WorkloadState::Failed, None, Some(String::new())).unwrap();
        assert_eq!(b.last_error.as_deref(), Some(UNSPECIFIED_FAILURE));
    }

    #[test]
    fn test_error_ignored_for_non_failed_state() {
        let registry = Registry::new();
        registry.register(spec("a")).unwrap();
        let entry = registry
            .transition(&"a".into(), WorkloadState::Running, Some(handle()), Some("ignored".into()))
            .unwrap();
        assert!(entry.last_error.is_none());
    }

    #[test]
    fn test_rejects_backward_and_terminal_transitions() {
        let registry = Registry::new();
        let id = WorkloadId::from("wl-1");
        registry.register(spec("wl-1")).unwrap();
        registry.transition(&id, WorkloadState::Running, Some(handle()), None).unwrap();

        let err = registry.transition(&id, WorkloadState::Pending, None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { from: WorkloadState::Running, to: WorkloadState::Pending, .. }));

        registry.transition(&id, WorkloadState::Succeeded, None, None).unwrap();
        assert!(registry.transition(&id, WorkloadState::Failed, None, Some("late".into())).is_err());
        assert_eq!(registry.get(&id).unwrap().state, WorkloadState::Succeeded);
    }

    #[test]
    fn test_pending_cannot_skip_to_succeeded() {
        let registry = Registry::new();
        registry.register(spec("wl-1")).unwrap();
        assert!(registry.transition(&"wl-1".into(), WorkloadState::Succeeded, None, None).is_err());
    }

    #[test]
    fn test_transition_unknown_id() {
        let registry = Registry::new();
        let err = registry.transition(&"ghost".into(), WorkloadState::Running, None, None).unwrap_err();
        assert_eq!(err, Error::NotFound("ghost".into()));
    }

    #[test]
    fn test_concurrent_registration_has_one_winner() {
        let registry = Arc::new(Registry::new());
        let threads: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.register(spec("contested")).is_ok())
            })
            .collect();

        let winners = threads.into_iter().map(|t| t.join().unwrap()).filter(|won| *won).count();
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }
}
