//! Correlation services: bridging client-facing and store-facing identities.
//!
//! Operation authors use these during the Executing stage to look up prior
//! state, substitute result instances, and register deferred transforms that
//! project store-side effects back onto client-facing entities after a
//! successful persist.

use crate::error::{ChangeSetError, ChangeSetResult};
use crate::set::{ChangeSet, StoreTransform};
use domainflow_model::Entity;

impl ChangeSet {
    /// Returns the original snapshot for `current`, by identity.
    ///
    /// Entries are scanned in declared order; the first one carrying an
    /// original snapshot wins. Duplicate entries with inconsistent originals
    /// are tolerated by design (no consistency check). Fails when the entity
    /// is not in the set, or when no matching entry has prior state (an
    /// insert-only entity has none by definition).
    pub fn original_of(&self, current: &Entity) -> ChangeSetResult<Entity> {
        let mut first_match = None;
        for entry in self.entries() {
            if !entry.entity().same(current) {
                continue;
            }
            if let Some(original) = entry.original() {
                return Ok(original.clone());
            }
            first_match.get_or_insert(entry.id());
        }

        match first_match {
            Some(id) => Err(ChangeSetError::NoOriginalState { id }),
            None => Err(ChangeSetError::EntityNotFound),
        }
    }

    /// Registers `replacement` as the result instance for `current`.
    ///
    /// The replacement is recorded once, keyed by the identity of `current`,
    /// and is therefore visible through every entry sharing that entity
    /// handle. The two instances must have the identical runtime type; a
    /// mismatch (including derived/unrelated types) is a fatal error naming
    /// both types. Fails when `current` is not any entry's entity.
    pub fn replace(&self, current: &Entity, replacement: Entity) -> ChangeSetResult<()> {
        if self.entry_for_entity(current).is_none() {
            return Err(ChangeSetError::EntityNotFound);
        }
        if current.type_name() != replacement.type_name() {
            return Err(ChangeSetError::replacement_type_mismatch(
                current.type_name(),
                replacement.type_name(),
            ));
        }

        self.record_replacement(current.clone(), replacement);
        Ok(())
    }

    /// Registers a deferred transform linking a client-facing entity to a
    /// store-facing one.
    ///
    /// `client` must be some entry's entity; `store` is an opaque external
    /// key with no existence check. The transform is **not** run here: it is
    /// queued and executed by [`ChangeSet::apply_store_transforms`], strictly
    /// in registration order. Multiple registrations for the same client
    /// entity are allowed; a later transform observes the mutations an
    /// earlier one made to the same entity.
    pub fn associate(
        &self,
        client: &Entity,
        store: &Entity,
        transform: impl FnOnce(&Entity, &Entity) -> ChangeSetResult<()> + Send + 'static,
    ) -> ChangeSetResult<()> {
        if self.entry_for_entity(client).is_none() {
            return Err(ChangeSetError::EntityNotFound);
        }

        self.transforms.lock().push(StoreTransform {
            client: client.clone(),
            store: store.clone(),
            apply: Some(Box::new(transform)),
        });
        Ok(())
    }

    /// Runs every pending store-entity transform, in registration order.
    ///
    /// The first transform to fail propagates its error immediately and
    /// unmodified; transforms that already ran stay applied (no rollback)
    /// and later ones do not run. Each transform runs at most once; the
    /// registered (client, store) pairs remain queryable afterwards via
    /// [`ChangeSet::associated_entities`].
    pub fn apply_store_transforms(&self) -> ChangeSetResult<()> {
        let mut index = 0;
        loop {
            // The lock is released while each transform runs, so transforms
            // may themselves call associate().
            let Some((client, store, apply)) = ({
                let mut transforms = self.transforms.lock();
                match transforms.get_mut(index) {
                    Some(transform) => Some((
                        transform.client.clone(),
                        transform.store.clone(),
                        transform.apply.take(),
                    )),
                    None => None,
                }
            }) else {
                return Ok(());
            };

            if let Some(apply) = apply {
                apply(&client, &store)?;
            }
            index += 1;
        }
    }

    /// Reverse lookup over the registered associations: every client entity
    /// paired with `store` (by identity), in registration order.
    ///
    /// `client_type` optionally restricts the result to client entities of
    /// that runtime type. Used by persistence code that, upon detecting a
    /// store-level conflict on one store row, must mark every client-facing
    /// entity associated with that row.
    pub fn associated_entities(&self, store: &Entity, client_type: Option<&str>) -> Vec<Entity> {
        self.transforms
            .lock()
            .iter()
            .filter(|t| t.store.same(store))
            .filter(|t| client_type.is_none_or(|name| t.client.type_name() == name))
            .map(|t| t.client.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ChangeEntry;
    use domainflow_model::SchemaRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn empty_schema() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::new())
    }

    fn set_of(entries: Vec<ChangeEntry>) -> ChangeSet {
        ChangeSet::new(entries, empty_schema()).unwrap()
    }

    #[test]
    fn original_of_returns_first_with_prior_state() {
        let shared = Entity::new("Order").with_field("Total", 2);
        let first_original = Entity::new("Order").with_field("Total", 1);
        let second_original = Entity::new("Order").with_field("Total", 0);

        // Three entries share the entity handle; the first has no original.
        let set = set_of(vec![
            ChangeEntry::unmodified(1, shared.clone()),
            ChangeEntry::update(2, shared.clone(), first_original),
            ChangeEntry::update(3, shared.clone(), second_original),
        ]);

        let original = set.original_of(&shared).unwrap();
        assert_eq!(original.get("Total"), Some(json!(1)));
    }

    #[test]
    fn original_of_unknown_entity_fails() {
        let set = set_of(vec![ChangeEntry::insert(1, Entity::new("Order"))]);
        let err = set.original_of(&Entity::new("Order")).unwrap_err();
        assert!(matches!(err, ChangeSetError::EntityNotFound));
    }

    #[test]
    fn original_of_insert_only_entity_fails() {
        let entity = Entity::new("Order");
        let set = set_of(vec![ChangeEntry::insert(1, entity.clone())]);
        let err = set.original_of(&entity).unwrap_err();
        assert!(matches!(err, ChangeSetError::NoOriginalState { id: 1 }));
    }

    #[test]
    fn replace_visible_from_every_sharing_entry() {
        let shared = Entity::new("Order");
        let original_a = Entity::new("Order");
        let set = set_of(vec![
            ChangeEntry::unmodified(1, shared.clone()),
            ChangeEntry::update(2, shared.clone(), original_a),
            ChangeEntry::unmodified(3, shared.clone()),
        ]);

        let replacement = Entity::new("Order").with_field("v", 1);
        set.replace(&shared, replacement).unwrap();

        for entry in set.entries() {
            assert!(set.replacement_for(entry.entity()).is_some());
        }
        assert_eq!(set.replacements().len(), 1);
    }

    #[test]
    fn replace_type_mismatch_fails() {
        let entity = Entity::new("Order");
        let set = set_of(vec![ChangeEntry::insert(1, entity.clone())]);

        let err = set
            .replace(&entity, Entity::new("PriorityOrder"))
            .unwrap_err();
        assert!(matches!(
            err,
            ChangeSetError::ReplacementTypeMismatch { .. }
        ));
    }

    #[test]
    fn replace_unknown_entity_fails() {
        let set = set_of(vec![ChangeEntry::insert(1, Entity::new("Order"))]);
        let err = set
            .replace(&Entity::new("Order"), Entity::new("Order"))
            .unwrap_err();
        assert!(matches!(err, ChangeSetError::EntityNotFound));
    }

    #[test]
    fn associate_requires_known_client() {
        let set = set_of(vec![ChangeEntry::insert(1, Entity::new("Order"))]);
        let err = set
            .associate(&Entity::new("Order"), &Entity::new("Row"), |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, ChangeSetError::EntityNotFound));
    }

    #[test]
    fn transforms_compose_in_registration_order() {
        let client = Entity::new("Order").with_field("Log", "");
        let store = Entity::new("Row");
        let set = set_of(vec![ChangeEntry::insert(1, client.clone())]);

        let append = |suffix: &'static str| {
            move |client: &Entity, _store: &Entity| {
                let mut log = client
                    .get("Log")
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default();
                log.push_str(suffix);
                client.set("Log", log);
                Ok(())
            }
        };

        set.associate(&client, &store, append("a")).unwrap();
        set.associate(&client, &store, append("b")).unwrap();
        set.apply_store_transforms().unwrap();

        // Concatenation in registration order, not an overwrite.
        assert_eq!(client.get("Log"), Some(json!("ab")));
    }

    #[test]
    fn transform_error_propagates_without_rollback() {
        let client = Entity::new("Order").with_field("Step", 0);
        let store = Entity::new("Row");
        let set = set_of(vec![ChangeEntry::insert(1, client.clone())]);

        set.associate(&client, &store, |client, _| {
            client.set("Step", 1);
            Ok(())
        })
        .unwrap();
        set.associate(&client, &store, |_, _| {
            Err(ChangeSetError::transform_failed("boom"))
        })
        .unwrap();
        set.associate(&client, &store, |client, _| {
            client.set("Step", 3);
            Ok(())
        })
        .unwrap();

        let err = set.apply_store_transforms().unwrap_err();
        assert!(matches!(err, ChangeSetError::TransformFailed { .. }));

        // The first transform stays applied, the third never ran.
        assert_eq!(client.get("Step"), Some(json!(1)));
    }

    #[test]
    fn transforms_run_at_most_once() {
        let client = Entity::new("Order").with_field("Count", 0);
        let store = Entity::new("Row");
        let set = set_of(vec![ChangeEntry::insert(1, client.clone())]);

        set.associate(&client, &store, |client, _| {
            let count = client.get("Count").and_then(|v| v.as_i64()).unwrap_or(0);
            client.set("Count", count + 1);
            Ok(())
        })
        .unwrap();

        set.apply_store_transforms().unwrap();
        set.apply_store_transforms().unwrap();
        assert_eq!(client.get("Count"), Some(json!(1)));
    }

    #[test]
    fn associated_entities_reverse_lookup() {
        let order = Entity::new("Order");
        let note = Entity::new("Note");
        let row_a = Entity::new("Row");
        let row_b = Entity::new("Row");
        let set = set_of(vec![
            ChangeEntry::insert(1, order.clone()),
            ChangeEntry::insert(2, note.clone()),
        ]);

        set.associate(&order, &row_a, |_, _| Ok(())).unwrap();
        set.associate(&note, &row_a, |_, _| Ok(())).unwrap();
        set.associate(&order, &row_b, |_, _| Ok(())).unwrap();

        assert_eq!(set.associated_entities(&row_a, None).len(), 2);
        let orders = set.associated_entities(&row_a, Some("Order"));
        assert_eq!(orders.len(), 1);
        assert!(orders[0].same(&order));

        // Identity, not value: a different Row instance matches nothing.
        assert!(set.associated_entities(&Entity::new("Row"), None).is_empty());
    }

    #[test]
    fn associated_entities_survive_apply() {
        let order = Entity::new("Order");
        let row = Entity::new("Row");
        let set = set_of(vec![ChangeEntry::insert(1, order.clone())]);

        set.associate(&order, &row, |_, _| Ok(())).unwrap();
        set.apply_store_transforms().unwrap();

        assert_eq!(set.associated_entities(&row, None).len(), 1);
    }
}
