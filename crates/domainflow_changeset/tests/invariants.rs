//! Property tests for change set structural invariants.

use domainflow_changeset::{ChangeEntry, ChangeSet, ChangeSetError, Operation};
use domainflow_model::{Entity, MemberDescriptor, MemberKind, SchemaRegistry, TypeDescriptor};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn schema() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::new().with_type(
        TypeDescriptor::new("Node").with_member(MemberDescriptor::new(
            "Peers",
            MemberKind::Association { collection: true },
        )),
    ))
}

fn entry_for(id: u64, operation: Operation) -> ChangeEntry {
    let entity = Entity::new("Node").with_field("Id", id);
    if operation.requires_original() {
        let original = entity.deep_clone();
        ChangeEntry::new(id, entity, operation).with_original(original)
    } else {
        ChangeEntry::new(id, entity, operation)
    }
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::None),
        Just(Operation::Insert),
        Just(Operation::Update),
        Just(Operation::Delete),
        Just(Operation::Custom),
    ]
}

proptest! {
    /// Unique ids with a closed association graph always construct, and the
    /// declared entry order is preserved.
    #[test]
    fn closed_graphs_construct(
        ids in proptest::collection::hash_set(0u64..500, 1..20),
        operations in proptest::collection::vec(arb_operation(), 20),
        edges in proptest::collection::vec((0usize..20, 0usize..20), 0..30),
    ) {
        let ids: Vec<u64> = ids.into_iter().collect();

        // Wire arbitrary associations between existing entries only.
        let mut peers: Vec<Vec<u64>> = vec![Vec::new(); ids.len()];
        for &(from, to) in &edges {
            peers[from % ids.len()].push(ids[to % ids.len()]);
        }

        let entries: Vec<ChangeEntry> = ids
            .iter()
            .zip(operations.iter())
            .zip(peers)
            .map(|((&id, &operation), peer_ids)| {
                entry_for(id, operation).with_association("Peers", peer_ids)
            })
            .collect();

        let declared: Vec<u64> = entries.iter().map(ChangeEntry::id).collect();
        let set = ChangeSet::new(entries, schema()).unwrap();
        let stored: Vec<u64> = set.entries().iter().map(ChangeEntry::id).collect();
        prop_assert_eq!(declared, stored);
    }

    /// Any repeated id fails construction with the duplicate-id error.
    #[test]
    fn duplicate_ids_rejected(
        ids in proptest::collection::vec(0u64..50, 2..20),
    ) {
        let unique: HashSet<u64> = ids.iter().copied().collect();
        prop_assume!(unique.len() < ids.len());

        let entries: Vec<ChangeEntry> =
            ids.iter().map(|&id| entry_for(id, Operation::Insert)).collect();

        let err = ChangeSet::new(entries, schema()).unwrap_err();
        let is_duplicate = matches!(err, ChangeSetError::DuplicateId { .. });
        prop_assert!(is_duplicate, "expected duplicate-id error, got: {err}");
    }

    /// Any association id outside the set fails construction.
    #[test]
    fn dangling_references_rejected(
        ids in proptest::collection::hash_set(0u64..100, 1..10),
        dangling in 100u64..200,
    ) {
        let ids: Vec<u64> = ids.into_iter().collect();
        let mut entries: Vec<ChangeEntry> =
            ids.iter().map(|&id| entry_for(id, Operation::None)).collect();
        let first = entries.remove(0);
        let id = first.id();
        entries.insert(
            0,
            entry_for(id, Operation::None).with_association("Peers", vec![dangling]),
        );

        let err = ChangeSet::new(entries, schema()).unwrap_err();
        let is_dangling = matches!(err, ChangeSetError::AssociationIdNotFound { .. });
        prop_assert!(is_dangling, "expected dangling-association error, got: {err}");
    }
}
