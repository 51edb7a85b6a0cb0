//! Association resolution over the flattened id-reference graph.

use crate::entry::Operation;
use crate::error::{ChangeSetError, ChangeSetResult};
use crate::set::ChangeSet;
use domainflow_model::Entity;
use std::collections::HashSet;

impl ChangeSet {
    /// Reconstructs "what changed on a navigation member" for an entity.
    ///
    /// `source` must be the entity of some entry, by identity (the first
    /// matching entry wins if the handle appears in several). `member` must
    /// be declared as an association on the entity's type. `filter`
    /// optionally restricts the result to entries of one operation kind;
    /// `None` means all kinds, deduplicated.
    ///
    /// Classification:
    /// - ids in the member's current list are classified by their owning
    ///   entry's `operation` field, which is authoritative;
    /// - ids only in the prior list contribute a result only when their
    ///   entry is a delete (other churn is already represented by the
    ///   current list).
    ///
    /// The result preserves declaration order (current-state order first,
    /// then original-only deletions), deduplicated by id, and resolves each
    /// id through its entry's current entity snapshot. A member with no
    /// declared id-lists yields an empty result, not an error.
    pub fn associated_changes(
        &self,
        source: &Entity,
        member: &str,
        filter: Option<Operation>,
    ) -> ChangeSetResult<Vec<Entity>> {
        let entry = self
            .entry_for_entity(source)
            .ok_or(ChangeSetError::EntityNotFound)?;

        let type_name = entry.entity().type_name();
        if !self.schema().is_association(type_name, member) {
            return Err(ChangeSetError::not_an_association(type_name, member));
        }

        let current = entry
            .associations()
            .get(member)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let original = entry
            .original_associations()
            .get(member)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let mut ordered = Vec::new();

        for &id in current {
            if seen.insert(id) {
                ordered.push(id);
            }
        }
        for &id in original {
            if seen.contains(&id) {
                continue;
            }
            // Construction guarantees the id resolves; the operation check
            // is the deciding factor here.
            if let Some(target) = self.entry_by_id(id) {
                if target.operation() == Operation::Delete {
                    seen.insert(id);
                    ordered.push(id);
                }
            }
        }

        let mut results = Vec::with_capacity(ordered.len());
        for id in ordered {
            let Some(target) = self.entry_by_id(id) else {
                continue;
            };
            if let Some(wanted) = filter {
                if target.operation() != wanted {
                    continue;
                }
            }
            results.push(target.entity().clone());
        }

        Ok(results)
    }
}
