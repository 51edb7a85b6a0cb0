//! Change entries: one mutation record per entity.

use domainflow_model::{Entity, ValidationResult, Value};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The kind of mutation a change entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// The entity is unmodified (present only to complete the graph).
    None,
    /// The entity is new.
    Insert,
    /// The entity is modified.
    Update,
    /// The entity is removed.
    Delete,
    /// A named domain action rather than a plain update.
    Custom,
}

impl Operation {
    /// Converts to a numeric code for wire encoding.
    pub fn to_code(&self) -> u8 {
        match self {
            Operation::None => 0,
            Operation::Insert => 1,
            Operation::Update => 2,
            Operation::Delete => 3,
            Operation::Custom => 4,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Operation::None),
            1 => Some(Operation::Insert),
            2 => Some(Operation::Update),
            3 => Some(Operation::Delete),
            4 => Some(Operation::Custom),
            _ => None,
        }
    }

    /// Returns true if this operation requires an original snapshot.
    pub fn requires_original(&self) -> bool {
        matches!(self, Operation::Update | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::None => "none",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// A named domain action with its ordered argument list.
///
/// Used by entries with [`Operation::Custom`], where the mutation is a
/// domain method invocation rather than a plain update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedAction {
    /// The action name.
    pub name: String,
    /// Ordered arguments passed to the action.
    pub arguments: Vec<Value>,
}

impl NamedAction {
    /// Creates a named action.
    pub fn new(name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// One mutation record within a change set.
///
/// The structural parts (`id`, snapshots, operation, association id-lists)
/// are fixed once the owning [`ChangeSet`](crate::ChangeSet) is constructed.
/// The outcome parts (validation errors, conflict members, store snapshot)
/// are interior-mutable so pipeline stages and operation authors can record
/// results through a shared reference. Entity *content* may also still
/// mutate through the entity handle.
#[derive(Debug)]
pub struct ChangeEntry {
    id: u64,
    entity: Entity,
    original: Option<Entity>,
    operation: Operation,
    named_actions: Vec<NamedAction>,
    associations: BTreeMap<String, Vec<u64>>,
    original_associations: BTreeMap<String, Vec<u64>>,
    conflict_members: RwLock<BTreeSet<String>>,
    store_entity: RwLock<Option<Entity>>,
    validation_errors: RwLock<Vec<ValidationResult>>,
}

impl ChangeEntry {
    /// Creates an entry for the given operation.
    ///
    /// Structural invariants (original required/forbidden, matching snapshot
    /// types) are checked when the change set is constructed, not here.
    pub fn new(id: u64, entity: Entity, operation: Operation) -> Self {
        Self {
            id,
            entity,
            original: None,
            operation,
            named_actions: Vec::new(),
            associations: BTreeMap::new(),
            original_associations: BTreeMap::new(),
            conflict_members: RwLock::new(BTreeSet::new()),
            store_entity: RwLock::new(None),
            validation_errors: RwLock::new(Vec::new()),
        }
    }

    /// Creates an insert entry.
    pub fn insert(id: u64, entity: Entity) -> Self {
        Self::new(id, entity, Operation::Insert)
    }

    /// Creates an update entry with its original snapshot.
    pub fn update(id: u64, entity: Entity, original: Entity) -> Self {
        Self::new(id, entity, Operation::Update).with_original(original)
    }

    /// Creates a delete entry with its original snapshot.
    pub fn delete(id: u64, entity: Entity, original: Entity) -> Self {
        Self::new(id, entity, Operation::Delete).with_original(original)
    }

    /// Creates an unmodified entry, present only to complete the graph.
    pub fn unmodified(id: u64, entity: Entity) -> Self {
        Self::new(id, entity, Operation::None)
    }

    /// Sets the original snapshot.
    pub fn with_original(mut self, original: Entity) -> Self {
        self.original = Some(original);
        self
    }

    /// Appends a named action.
    pub fn with_named_action(mut self, action: NamedAction) -> Self {
        self.named_actions.push(action);
        self
    }

    /// Declares the current state of an association member as an id list.
    pub fn with_association(mut self, member: impl Into<String>, ids: Vec<u64>) -> Self {
        self.associations.insert(member.into(), ids);
        self
    }

    /// Declares the prior state of an association member as an id list.
    pub fn with_original_association(mut self, member: impl Into<String>, ids: Vec<u64>) -> Self {
        self.original_associations.insert(member.into(), ids);
        self
    }

    /// The caller-assigned id, unique within the change set.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The current entity snapshot.
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// The prior entity snapshot, if any.
    pub fn original(&self) -> Option<&Entity> {
        self.original.as_ref()
    }

    /// The operation kind.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The ordered named actions (used with [`Operation::Custom`]).
    pub fn named_actions(&self) -> &[NamedAction] {
        &self.named_actions
    }

    /// Current association id-lists, keyed by member name.
    pub fn associations(&self) -> &BTreeMap<String, Vec<u64>> {
        &self.associations
    }

    /// Prior association id-lists, keyed by member name.
    pub fn original_associations(&self) -> &BTreeMap<String, Vec<u64>> {
        &self.original_associations
    }

    /// Returns true if any scalar member differs between the current and
    /// original snapshots. False when there is no original snapshot.
    pub fn has_member_changes(&self) -> bool {
        self.original
            .as_ref()
            .map(|original| self.entity.scalar_members_differ(original))
            .unwrap_or(false)
    }

    /// Appends a continuable validation failure to this entry.
    pub fn add_validation_error(&self, result: ValidationResult) {
        self.validation_errors.write().push(result);
    }

    /// Returns the accumulated validation failures, in order.
    pub fn validation_errors(&self) -> Vec<ValidationResult> {
        self.validation_errors.read().clone()
    }

    /// Returns true if this entry carries any validation failures.
    pub fn has_validation_errors(&self) -> bool {
        !self.validation_errors.read().is_empty()
    }

    /// Records an optimistic-concurrency conflict reported by the store.
    ///
    /// `members` names the members whose store-side values disagree with the
    /// submitted original; `store_snapshot` is the store-side state, when the
    /// provider supplies one. Conflicts are continuable and independent of
    /// validation errors.
    pub fn record_conflict(
        &self,
        members: impl IntoIterator<Item = impl Into<String>>,
        store_snapshot: Option<Entity>,
    ) {
        let mut conflict = self.conflict_members.write();
        for member in members {
            conflict.insert(member.into());
        }
        if store_snapshot.is_some() {
            *self.store_entity.write() = store_snapshot;
        }
    }

    /// The members flagged as conflicting by the persistence provider.
    pub fn conflict_members(&self) -> BTreeSet<String> {
        self.conflict_members.read().clone()
    }

    /// Returns true if the store flagged any conflicting members.
    pub fn has_conflicts(&self) -> bool {
        !self.conflict_members.read().is_empty()
    }

    /// The store-side snapshot recorded with a conflict, if any.
    pub fn store_entity(&self) -> Option<Entity> {
        self.store_entity.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_codes_roundtrip() {
        for op in [
            Operation::None,
            Operation::Insert,
            Operation::Update,
            Operation::Delete,
            Operation::Custom,
        ] {
            assert_eq!(Operation::from_code(op.to_code()), Some(op));
        }
        assert_eq!(Operation::from_code(9), None);
    }

    #[test]
    fn requires_original() {
        assert!(Operation::Update.requires_original());
        assert!(Operation::Delete.requires_original());
        assert!(!Operation::Insert.requires_original());
        assert!(!Operation::None.requires_original());
        assert!(!Operation::Custom.requires_original());
    }

    #[test]
    fn member_changes_against_original() {
        let original = Entity::new("Order").with_field("Total", 10);
        let current = original.deep_clone();
        let entry = ChangeEntry::update(1, current.clone(), original);

        assert!(!entry.has_member_changes());
        current.set("Total", 11);
        assert!(entry.has_member_changes());
    }

    #[test]
    fn insert_has_no_member_changes() {
        let entry = ChangeEntry::insert(1, Entity::new("Order"));
        assert!(!entry.has_member_changes());
    }

    #[test]
    fn conflict_recording() {
        let entry = ChangeEntry::insert(1, Entity::new("Order"));
        assert!(!entry.has_conflicts());

        let store = Entity::new("Order").with_field("Message", json!("server"));
        entry.record_conflict(["Message"], Some(store));

        assert!(entry.has_conflicts());
        assert!(entry.conflict_members().contains("Message"));
        assert_eq!(
            entry.store_entity().unwrap().get("Message"),
            Some(json!("server"))
        );
    }

    #[test]
    fn validation_errors_accumulate_in_order() {
        let entry = ChangeEntry::insert(1, Entity::new("Order"));
        entry.add_validation_error(ValidationResult::new("first", ["A"]));
        entry.add_validation_error(ValidationResult::new("second", ["B"]));

        let errors = entry.validation_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "first");
        assert_eq!(errors[1].message, "second");
        assert!(entry.has_validation_errors());
    }
}
