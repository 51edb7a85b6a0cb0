//! The persistence collaborator boundary and cancellation token.

use crate::error::PipelineResult;
use domainflow_changeset::ChangeSet;
use domainflow_model::{Entity, Value};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared cancellation signal threaded through every pipeline stage.
///
/// Cancellation is checked at stage boundaries (the pipeline's only
/// suspension points). A long-running persistence provider should also
/// poll the token it receives. Cancelling gives no guarantee beyond
/// whatever partial persistence the provider already committed; the
/// framework performs no compensating rollback.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation. Safe to call from another thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Flushes successfully-executed mutations to the backing store.
///
/// Returns `Ok(true)` when the batch persisted cleanly, `Ok(false)` when it
/// completed but optimistic-concurrency conflicts were detected. Conflicts
/// are reported by recording conflict members and store snapshots on the
/// affected entries, without raising. `Err` is a fatal failure. The
/// conflict-members mechanism is the framework's sole concurrency-control
/// signal.
pub trait PersistenceProvider: Send + Sync {
    /// Persists the change set's pending mutations.
    fn persist(&self, change_set: &ChangeSet, cancel: &CancelToken) -> PipelineResult<bool>;
}

/// A scripted conflict for [`MemoryPersistence`].
#[derive(Debug, Clone)]
struct ScriptedConflict {
    entry_id: u64,
    members: Vec<String>,
    store_fields: BTreeMap<String, Value>,
}

/// An in-memory persistence provider for tests and embedding.
///
/// Records each persisted batch's entry ids and can be scripted to report
/// conflicts or fail outright.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    persisted: Mutex<Vec<Vec<u64>>>,
    conflicts: Mutex<Vec<ScriptedConflict>>,
    failure: Mutex<Option<String>>,
}

impl MemoryPersistence {
    /// Creates a provider that persists everything cleanly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a conflict for the given entry on the next persist.
    pub fn script_conflict(
        &self,
        entry_id: u64,
        members: impl IntoIterator<Item = impl Into<String>>,
        store_fields: BTreeMap<String, Value>,
    ) {
        self.conflicts.lock().push(ScriptedConflict {
            entry_id,
            members: members.into_iter().map(Into::into).collect(),
            store_fields,
        });
    }

    /// Makes the next persist fail fatally with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// The entry-id batches persisted so far, in order.
    pub fn persisted_batches(&self) -> Vec<Vec<u64>> {
        self.persisted.lock().clone()
    }
}

impl PersistenceProvider for MemoryPersistence {
    fn persist(&self, change_set: &ChangeSet, cancel: &CancelToken) -> PipelineResult<bool> {
        if cancel.is_cancelled() {
            return Err(crate::error::PipelineError::Cancelled);
        }
        if let Some(message) = self.failure.lock().take() {
            return Err(crate::error::PipelineError::persistence(message));
        }

        let ids: Vec<u64> = change_set
            .entries()
            .iter()
            .map(domainflow_changeset::ChangeEntry::id)
            .collect();
        self.persisted.lock().push(ids);

        let scripted: Vec<ScriptedConflict> = self.conflicts.lock().drain(..).collect();
        let mut clean = true;
        for conflict in scripted {
            if let Some(entry) = change_set.entry_by_id(conflict.entry_id) {
                let snapshot = Entity::new(entry.entity().type_name());
                for (name, value) in conflict.store_fields {
                    snapshot.set(name, value);
                }
                entry.record_conflict(conflict.members, Some(snapshot));
                clean = false;
            }
        }

        Ok(clean)
    }
}
