//! Property-based test generators using proptest.
//!
//! Strategies generate structurally valid change-set inputs: unique entry
//! ids, closed association graphs, and snapshots consistent with their
//! operation kinds.

use domainflow_changeset::{ChangeEntry, Operation};
use domainflow_model::{Entity, Value};
use proptest::prelude::*;
use std::collections::HashSet;

/// Strategy for valid member names.
pub fn member_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z0-9]{0,15}").expect("invalid regex")
}

/// Strategy for scalar member values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-z ]{0,24}".prop_map(Value::from),
    ]
}

/// Strategy for operation kinds that mutate an entity.
pub fn mutating_operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Insert),
        Just(Operation::Update),
        Just(Operation::Delete),
    ]
}

/// Strategy for an entity of the given type with random scalar fields.
pub fn entity_strategy(type_name: &'static str) -> impl Strategy<Value = Entity> {
    prop::collection::btree_map(member_name_strategy(), scalar_value_strategy(), 0..6).prop_map(
        move |fields| {
            let entity = Entity::new(type_name);
            for (name, value) in fields {
                entity.set(name, value);
            }
            entity
        },
    )
}

/// Strategy for a vector of unique entry ids.
pub fn unique_ids_strategy(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::hash_set(1u64..10_000, 1..=max_len)
        .prop_map(|set| set.into_iter().collect())
}

/// Strategy for a list of entries forming a closed association graph.
///
/// Every generated association id refers to another entry in the same
/// list, so `ChangeSet::new` always accepts the result.
pub fn closed_entries_strategy(max_len: usize) -> impl Strategy<Value = Vec<ChangeEntry>> {
    unique_ids_strategy(max_len)
        .prop_flat_map(|ids| {
            let len = ids.len();
            (
                Just(ids),
                prop::collection::vec(
                    (
                        mutating_operation_strategy(),
                        prop::collection::vec(0..len, 0..4),
                    ),
                    len,
                ),
            )
        })
        .prop_map(|(ids, shapes)| {
            ids.iter()
                .zip(shapes)
                .map(|(&id, (operation, peer_indices))| {
                    let entity = Entity::new("Node").with_field("Id", id);
                    let mut entry = ChangeEntry::new(id, entity.clone(), operation);
                    if operation.requires_original() {
                        entry = entry.with_original(entity.deep_clone());
                    }
                    let peers: Vec<u64> = peer_indices
                        .into_iter()
                        .map(|index| ids[index])
                        .collect::<HashSet<_>>()
                        .into_iter()
                        .collect();
                    if !peers.is_empty() {
                        entry = entry.with_association("Peers", peers);
                    }
                    entry
                })
                .collect()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainflow_model::SchemaRegistry;
    use std::sync::Arc;

    proptest! {
        #[test]
        fn unique_ids_are_unique(ids in unique_ids_strategy(16)) {
            let set: HashSet<u64> = ids.iter().copied().collect();
            prop_assert_eq!(set.len(), ids.len());
        }

        #[test]
        fn closed_entries_construct(entries in closed_entries_strategy(12)) {
            let schema = Arc::new(
                SchemaRegistry::new().with_type(
                    domainflow_model::TypeDescriptor::new("Node").with_member(
                        domainflow_model::MemberDescriptor::new(
                            "Peers",
                            domainflow_model::MemberKind::Association { collection: true },
                        ),
                    ),
                ),
            );
            prop_assert!(domainflow_changeset::ChangeSet::new(entries, schema).is_ok());
        }
    }
}
