//! Shared fixtures: a small order-entry schema and pre-wired change sets.
//!
//! The fixture domain is an order with scalar fields, a composite shipping
//! address, a composite list of lines, and an association to line entities
//! tracked as separate change entries.

use domainflow_changeset::{ChangeEntry, ChangeSet, Operation};
use domainflow_model::{
    Entity, MemberDescriptor, MemberKind, SchemaRegistry, TypeDescriptor, ValidationResult,
    ValidationRule, Value,
};
use serde_json::json;
use std::sync::Arc;

/// Builds the order-entry schema used across the test suites.
///
/// Declares three types:
/// - `Order`: required `Number` (1..=20 chars), `Total` in 0..=1_000_000,
///   composite `ShipTo` address, composite list `Items`, association
///   collection `Lines`, singleton association `Customer`, and an
///   object rule requiring a positive `Total` whenever `Items` is present.
/// - `Address`: required `Street` and `City`.
/// - `OrderLine`: required `Sku`, `Quantity` in 1..=999.
pub fn order_schema() -> Arc<SchemaRegistry> {
    let schema = SchemaRegistry::new()
        .with_type(
            TypeDescriptor::new("Order")
                .with_member(
                    MemberDescriptor::new("Number", MemberKind::Scalar)
                        .with_rule(ValidationRule::Required)
                        .with_rule(ValidationRule::StringLength { min: 1, max: 20 }),
                )
                .with_member(
                    MemberDescriptor::new("Total", MemberKind::Scalar)
                        .with_rule(ValidationRule::Range {
                            min: 0.0,
                            max: 1_000_000.0,
                        }),
                )
                .with_member(MemberDescriptor::new(
                    "ShipTo",
                    MemberKind::Composite {
                        type_name: "Address".into(),
                    },
                ))
                .with_member(MemberDescriptor::new(
                    "Items",
                    MemberKind::CompositeList {
                        type_name: "OrderLine".into(),
                    },
                ))
                .with_member(MemberDescriptor::new(
                    "Lines",
                    MemberKind::Association { collection: true },
                ))
                .with_member(MemberDescriptor::new(
                    "Customer",
                    MemberKind::Association { collection: false },
                ))
                .with_object_rule(|entity| {
                    let has_items = entity
                        .get("Items")
                        .map(|items| items.as_array().map(|a| !a.is_empty()).unwrap_or(false))
                        .unwrap_or(false);
                    let total_positive = entity
                        .get("Total")
                        .and_then(|total| total.as_f64())
                        .map(|total| total > 0.0)
                        .unwrap_or(false);
                    if has_items && !total_positive {
                        vec![ValidationResult::new(
                            "an order with items must have a positive total",
                            ["Total", "Items"],
                        )]
                    } else {
                        Vec::new()
                    }
                }),
        )
        .with_type(
            TypeDescriptor::new("Address")
                .with_member(
                    MemberDescriptor::new("Street", MemberKind::Scalar)
                        .with_rule(ValidationRule::Required),
                )
                .with_member(
                    MemberDescriptor::new("City", MemberKind::Scalar)
                        .with_rule(ValidationRule::Required),
                ),
        )
        .with_type(
            TypeDescriptor::new("OrderLine")
                .with_member(
                    MemberDescriptor::new("Sku", MemberKind::Scalar)
                        .with_rule(ValidationRule::Required),
                )
                .with_member(
                    MemberDescriptor::new("Quantity", MemberKind::Scalar).with_rule(
                        ValidationRule::Range {
                            min: 1.0,
                            max: 999.0,
                        },
                    ),
                ),
        );
    Arc::new(schema)
}

/// Builds an order entity with the given number and total.
pub fn order(number: &str, total: i64) -> Entity {
    Entity::new("Order")
        .with_field("Number", number)
        .with_field("Total", total)
}

/// Builds an order-line entity.
pub fn order_line(sku: &str, quantity: i64) -> Entity {
    Entity::new("OrderLine")
        .with_field("Sku", sku)
        .with_field("Quantity", quantity)
}

/// Builds an address as a composite member value.
pub fn address_value(street: &str, city: &str) -> Value {
    json!({ "Street": street, "City": city })
}

/// Builds an order-line as a composite list element value.
pub fn item_value(sku: &str, quantity: i64) -> Value {
    json!({ "Sku": sku, "Quantity": quantity })
}

/// A change set holding a single insert of the given entity.
pub fn single_insert(entity: Entity) -> ChangeSet {
    ChangeSet::new(vec![ChangeEntry::insert(1, entity)], order_schema())
        .expect("fixture change set must construct")
}

/// A change set holding a single update with the given original snapshot.
pub fn single_update(current: Entity, original: Entity) -> ChangeSet {
    ChangeSet::new(
        vec![ChangeEntry::update(1, current, original)],
        order_schema(),
    )
    .expect("fixture change set must construct")
}

/// An order with nine associated lines covering every operation kind.
///
/// The parent order (entry 1) declares its `Lines` association over:
/// - ids 10..=12: unmodified
/// - ids 20..=21: updated
/// - ids 30..=31: inserted
/// - ids 40..=41: deleted (present only in the original association)
///
/// Returns the constructed change set together with the parent entity
/// handle for association queries.
pub fn order_with_lines() -> (ChangeSet, Entity) {
    let parent = order("ORD-100", 90);
    let mut entries = vec![ChangeEntry::insert(1, parent.clone())
        .with_association("Lines", vec![10, 11, 12, 20, 21, 30, 31])
        .with_original_association("Lines", vec![10, 11, 12, 20, 21, 40, 41])];

    for id in [10u64, 11, 12] {
        entries.push(ChangeEntry::unmodified(id, order_line("SKU-U", 1)));
    }
    for id in [20u64, 21] {
        let current = order_line("SKU-M", 2);
        let original = order_line("SKU-M", 1);
        entries.push(ChangeEntry::update(id, current, original));
    }
    for id in [30u64, 31] {
        entries.push(ChangeEntry::insert(id, order_line("SKU-N", 3)));
    }
    for id in [40u64, 41] {
        let line = order_line("SKU-D", 4);
        entries.push(ChangeEntry::delete(id, line.clone(), line.deep_clone()));
    }

    let set = ChangeSet::new(entries, order_schema()).expect("fixture change set must construct");
    (set, parent)
}

/// Counts the entries in a change set carrying the given operation.
pub fn count_by_operation(set: &ChangeSet, operation: Operation) -> usize {
    set.entries()
        .iter()
        .filter(|entry| entry.operation() == operation)
        .count()
}
