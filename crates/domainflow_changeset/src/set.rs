//! The change set: an ordered batch of change entries with graph invariants.

use crate::entry::{ChangeEntry, Operation};
use crate::error::{ChangeSetError, ChangeSetResult};
use domainflow_model::{Entity, SchemaRegistry};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A deferred store-entity transform registered via
/// [`ChangeSet::associate`](crate::ChangeSet::associate).
///
/// The (client, store) pair outlives the closure so reverse lookups keep
/// working after the transforms have run.
pub(crate) struct StoreTransform {
    pub(crate) client: Entity,
    pub(crate) store: Entity,
    pub(crate) apply: Option<TransformFn>,
}

/// Signature for deferred store-entity transforms.
pub type TransformFn = Box<dyn FnOnce(&Entity, &Entity) -> ChangeSetResult<()> + Send>;

/// An ordered batch of change entries for one submission.
///
/// Construction is the sole structural checkpoint: once a `ChangeSet`
/// exists, every entry id is unique, every association id resolves to an
/// entry in the same set, and each entry's snapshots agree with its
/// operation. A change set is built once per request, threaded through the
/// pipeline stages, and discarded after the result is serialized back.
pub struct ChangeSet {
    entries: Vec<ChangeEntry>,
    schema: Arc<SchemaRegistry>,
    replacements: RwLock<Vec<(Entity, Entity)>>,
    pub(crate) transforms: Mutex<Vec<StoreTransform>>,
}

impl ChangeSet {
    /// Builds a change set from a flat entry list, enforcing the structural
    /// invariants.
    ///
    /// Empty input produces a valid, empty set. Violations produce a fatal
    /// [`ChangeSetError`] naming the invariant and the offending ids/types.
    pub fn new(entries: Vec<ChangeEntry>, schema: Arc<SchemaRegistry>) -> ChangeSetResult<Self> {
        let mut ids = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !ids.insert(entry.id()) {
                return Err(ChangeSetError::DuplicateId { id: entry.id() });
            }
        }

        for entry in &entries {
            // Closed reference graph: every association id must resolve.
            for (member, list) in entry
                .associations()
                .iter()
                .chain(entry.original_associations().iter())
            {
                for id in list {
                    if !ids.contains(id) {
                        return Err(ChangeSetError::association_id_not_found(
                            entry.id(),
                            member,
                            *id,
                        ));
                    }
                }
            }

            match (entry.operation(), entry.original()) {
                (Operation::Insert, Some(_)) => {
                    return Err(ChangeSetError::OriginalOnInsert { id: entry.id() });
                }
                (operation, None) if operation.requires_original() => {
                    return Err(ChangeSetError::MissingOriginal {
                        id: entry.id(),
                        operation,
                    });
                }
                _ => {}
            }

            if let Some(original) = entry.original() {
                if original.type_name() != entry.entity().type_name() {
                    return Err(ChangeSetError::SnapshotTypeMismatch {
                        id: entry.id(),
                        entity_type: entry.entity().type_name().to_string(),
                        original_type: original.type_name().to_string(),
                    });
                }
            }
        }

        Ok(Self {
            entries,
            schema,
            replacements: RwLock::new(Vec::new()),
            transforms: Mutex::new(Vec::new()),
        })
    }

    /// The entries, in caller-submitted order.
    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The schema registry the set was constructed with.
    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// Looks up an entry by its id.
    pub fn entry_by_id(&self, id: u64) -> Option<&ChangeEntry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    /// Looks up the first entry (in declared order) whose entity is the
    /// given handle, by identity.
    pub fn entry_for_entity(&self, entity: &Entity) -> Option<&ChangeEntry> {
        self.entries
            .iter()
            .find(|entry| entry.entity().same(entity))
    }

    /// Returns true if any entry carries validation errors or conflict
    /// members.
    ///
    /// Conflicts count as errors here: this is the gate the pipeline
    /// consults before persisting and before applying store transforms,
    /// and a conflicted batch must fail that gate just like an invalid
    /// one. Both kinds stay recorded on their entries and are reported
    /// separately on the wire.
    pub fn has_error(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.has_validation_errors() || entry.has_conflicts())
    }

    /// Records a replacement for every entry whose entity is `current`.
    ///
    /// Exposed on the set for the serializer walk; use
    /// [`ChangeSet::replace`](crate::ChangeSet::replace) from operation code.
    pub(crate) fn record_replacement(&self, current: Entity, replacement: Entity) {
        let mut replacements = self.replacements.write();
        if let Some(slot) = replacements.iter_mut().find(|(c, _)| c.same(&current)) {
            slot.1 = replacement;
        } else {
            replacements.push((current, replacement));
        }
    }

    /// The replacement registered for `current`, if any.
    pub fn replacement_for(&self, current: &Entity) -> Option<Entity> {
        self.replacements
            .read()
            .iter()
            .find(|(c, _)| c.same(current))
            .map(|(_, replacement)| replacement.clone())
    }

    /// All registered (original, replacement) pairs, in registration order.
    pub fn replacements(&self) -> Vec<(Entity, Entity)> {
        self.replacements.read().clone()
    }
}

impl fmt::Debug for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSet")
            .field("entries", &self.entries)
            .field("replacements", &self.replacements.read().len())
            .field("pending_transforms", &self.transforms.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ChangeEntry;
    use domainflow_model::{MemberDescriptor, MemberKind, TypeDescriptor};

    fn schema() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::new().with_type(
            TypeDescriptor::new("Order").with_member(MemberDescriptor::new(
                "Lines",
                MemberKind::Association { collection: true },
            )),
        ))
    }

    #[test]
    fn empty_input_is_valid() {
        let set = ChangeSet::new(Vec::new(), schema()).unwrap();
        assert!(set.is_empty());
        assert!(!set.has_error());
    }

    #[test]
    fn conflict_only_entries_count_as_errors() {
        let set = ChangeSet::new(
            vec![ChangeEntry::insert(1, Entity::new("Order"))],
            schema(),
        )
        .unwrap();
        assert!(!set.has_error());

        set.entries()[0].record_conflict(["Total"], None);
        assert!(set.has_error());
    }

    #[test]
    fn duplicate_id_rejected() {
        let entries = vec![
            ChangeEntry::insert(1, Entity::new("Order")),
            ChangeEntry::insert(1, Entity::new("Order")),
        ];
        let err = ChangeSet::new(entries, schema()).unwrap_err();
        assert!(matches!(err, ChangeSetError::DuplicateId { id: 1 }));
    }

    #[test]
    fn dangling_association_rejected() {
        let entries = vec![ChangeEntry::insert(1, Entity::new("Order"))
            .with_association("Lines", vec![1, 7])];
        let err = ChangeSet::new(entries, schema()).unwrap_err();
        assert!(matches!(
            err,
            ChangeSetError::AssociationIdNotFound {
                entry_id: 1,
                id: 7,
                ..
            }
        ));
    }

    #[test]
    fn dangling_original_association_rejected() {
        let entries = vec![ChangeEntry::insert(1, Entity::new("Order"))
            .with_original_association("Lines", vec![9])];
        assert!(ChangeSet::new(entries, schema()).is_err());
    }

    #[test]
    fn insert_with_original_rejected() {
        let entity = Entity::new("Order");
        let entries =
            vec![ChangeEntry::insert(1, entity.clone()).with_original(entity.deep_clone())];
        let err = ChangeSet::new(entries, schema()).unwrap_err();
        assert!(matches!(err, ChangeSetError::OriginalOnInsert { id: 1 }));
    }

    #[test]
    fn update_without_original_rejected() {
        let entries = vec![ChangeEntry::new(1, Entity::new("Order"), Operation::Update)];
        let err = ChangeSet::new(entries, schema()).unwrap_err();
        assert!(matches!(
            err,
            ChangeSetError::MissingOriginal {
                id: 1,
                operation: Operation::Update
            }
        ));
    }

    #[test]
    fn delete_without_original_rejected() {
        let entries = vec![ChangeEntry::new(1, Entity::new("Order"), Operation::Delete)];
        assert!(ChangeSet::new(entries, schema()).is_err());
    }

    #[test]
    fn snapshot_type_mismatch_rejected() {
        let entries = vec![ChangeEntry::update(
            1,
            Entity::new("Order"),
            Entity::new("Invoice"),
        )];
        let err = ChangeSet::new(entries, schema()).unwrap_err();
        assert!(matches!(err, ChangeSetError::SnapshotTypeMismatch { .. }));
    }

    #[test]
    fn entry_order_preserved() {
        let entries = vec![
            ChangeEntry::insert(5, Entity::new("Order")),
            ChangeEntry::insert(2, Entity::new("Order")),
            ChangeEntry::insert(9, Entity::new("Order")),
        ];
        let set = ChangeSet::new(entries, schema()).unwrap();
        let ids: Vec<u64> = set.entries().iter().map(ChangeEntry::id).collect();
        assert_eq!(ids, vec![5, 2, 9]);
    }

    #[test]
    fn identity_lookup_finds_first_entry() {
        let shared = Entity::new("Order");
        let entries = vec![
            ChangeEntry::insert(1, shared.clone()),
            ChangeEntry::insert(2, shared.clone()),
        ];
        let set = ChangeSet::new(entries, schema()).unwrap();
        assert_eq!(set.entry_for_entity(&shared).unwrap().id(), 1);

        // An equal-valued but distinct entity is not found.
        assert!(set.entry_for_entity(&shared.deep_clone()).is_none());
    }

    #[test]
    fn replacement_upsert() {
        let set = ChangeSet::new(Vec::new(), schema()).unwrap();
        let original = Entity::new("Order");

        set.record_replacement(original.clone(), Entity::new("Order").with_field("v", 1));
        set.record_replacement(original.clone(), Entity::new("Order").with_field("v", 2));

        assert_eq!(set.replacements().len(), 1);
        assert_eq!(
            set.replacement_for(&original).unwrap().get("v"),
            Some(serde_json::json!(2))
        );
    }
}
