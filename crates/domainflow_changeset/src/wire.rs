//! Wire DTOs consumed from and produced for the transport layer.
//!
//! The transport hosting layer deserializes a flat list of
//! [`ChangeEntryDto`] records, builds the change set through
//! [`build_change_set`], and serializes the processed set back with
//! [`to_response`]. Association deltas stay flattened as id lists on the
//! wire; the object graph only exists after construction.

use crate::entry::{ChangeEntry, NamedAction, Operation};
use crate::error::{ChangeSetError, ChangeSetResult};
use crate::set::ChangeSet;
use domainflow_model::{Entity, SchemaRegistry, ValidationResult, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A flat wire record for one change entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntryDto {
    /// Caller-assigned correlation id, unique within the batch.
    pub id: u64,
    /// The entity's runtime type name.
    pub entity_type: String,
    /// Current snapshot fields. Required; its absence is a structural error.
    pub entity: Option<BTreeMap<String, Value>>,
    /// Prior snapshot fields, when the operation carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<BTreeMap<String, Value>>,
    /// Operation code (see [`Operation::to_code`]).
    pub operation: u8,
    /// Named domain actions for custom operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub named_actions: Vec<NamedAction>,
    /// Current association id-lists, keyed by member name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub associations: BTreeMap<String, Vec<u64>>,
    /// Prior association id-lists, keyed by member name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub original_associations: BTreeMap<String, Vec<u64>>,
    /// Response only: members flagged as conflicting by the store.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflict_members: Vec<String>,
    /// Response only: store-side snapshot recorded with a conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_entity: Option<BTreeMap<String, Value>>,
    /// Response only: accumulated validation failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationResult>,
    /// Response only: whether any scalar member changed.
    #[serde(default)]
    pub has_member_changes: bool,
}

impl ChangeEntryDto {
    /// Creates a request DTO with the minimum required fields.
    pub fn new(id: u64, entity_type: impl Into<String>, operation: Operation) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            entity: Some(BTreeMap::new()),
            original: None,
            operation: operation.to_code(),
            named_actions: Vec::new(),
            associations: BTreeMap::new(),
            original_associations: BTreeMap::new(),
            conflict_members: Vec::new(),
            store_entity: None,
            validation_errors: Vec::new(),
            has_member_changes: false,
        }
    }

    /// Builds a change entry from this wire record.
    pub fn into_entry(self) -> ChangeSetResult<ChangeEntry> {
        let operation = Operation::from_code(self.operation).ok_or(
            ChangeSetError::InvalidOperationCode {
                id: self.id,
                code: self.operation,
            },
        )?;

        let fields = self
            .entity
            .ok_or(ChangeSetError::MissingEntity { id: self.id })?;

        let entity = materialize(&self.entity_type, fields);
        let mut entry = ChangeEntry::new(self.id, entity, operation);

        if let Some(original_fields) = self.original {
            entry = entry.with_original(materialize(&self.entity_type, original_fields));
        }
        for action in self.named_actions {
            entry = entry.with_named_action(action);
        }
        for (member, ids) in self.associations {
            entry = entry.with_association(member, ids);
        }
        for (member, ids) in self.original_associations {
            entry = entry.with_original_association(member, ids);
        }

        Ok(entry)
    }

    /// Flattens a processed entry into a response record.
    ///
    /// `result_entity` is the snapshot to report as current state; the
    /// serializer walk substitutes a registered replacement here.
    fn from_entry(entry: &ChangeEntry, result_entity: &Entity) -> Self {
        Self {
            id: entry.id(),
            entity_type: result_entity.type_name().to_string(),
            entity: Some(result_entity.fields()),
            original: entry.original().map(Entity::fields),
            operation: entry.operation().to_code(),
            named_actions: entry.named_actions().to_vec(),
            associations: entry.associations().clone(),
            original_associations: entry.original_associations().clone(),
            conflict_members: entry.conflict_members().into_iter().collect(),
            store_entity: entry.store_entity().map(|e| e.fields()),
            validation_errors: entry.validation_errors(),
            has_member_changes: entry.has_member_changes(),
        }
    }
}

fn materialize(type_name: &str, fields: BTreeMap<String, Value>) -> Entity {
    let entity = Entity::new(type_name);
    for (name, value) in fields {
        entity.set(name, value);
    }
    entity
}

/// Builds a change set from a flat list of wire records.
///
/// Wire-level errors (missing snapshot, bad operation code) and structural
/// invariant violations are both fatal and reported from here.
pub fn build_change_set(
    dtos: Vec<ChangeEntryDto>,
    schema: Arc<SchemaRegistry>,
) -> ChangeSetResult<ChangeSet> {
    let entries = dtos
        .into_iter()
        .map(ChangeEntryDto::into_entry)
        .collect::<ChangeSetResult<Vec<_>>>()?;
    ChangeSet::new(entries, schema)
}

/// Walks a completed change set into response records, substituting
/// registered replacements for their original entities.
pub fn to_response(set: &ChangeSet) -> Vec<ChangeEntryDto> {
    set.entries()
        .iter()
        .map(|entry| {
            let result_entity = set
                .replacement_for(entry.entity())
                .unwrap_or_else(|| entry.entity().clone());
            ChangeEntryDto::from_entry(entry, &result_entity)
        })
        .collect()
}
