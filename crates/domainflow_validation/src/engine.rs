//! The entity graph validator.

use crate::path::MemberPath;
use domainflow_model::{Entity, MemberKind, SchemaRegistry, ValidationResult, Value};
use std::sync::Arc;

/// Deep, path-aware validator over entity graphs.
///
/// A single pass evaluates every member's declared property rules and the
/// type's object-level callbacks, recursively descending into composite
/// members and ordered collections of composites. All failures are
/// **accumulated**: one pass can and should produce more than one result
/// when more than one rule fails. The pass never raises; its output is the
/// continuable-failure channel.
#[derive(Debug, Clone)]
pub struct EntityValidator {
    schema: Arc<SchemaRegistry>,
}

impl EntityValidator {
    /// Creates a validator over the given schema.
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self { schema }
    }

    /// Validates an entity graph, returning every discovered failure.
    ///
    /// An entity whose type has no registered descriptor validates
    /// vacuously; the registry owner controls strictness.
    pub fn validate(&self, entity: &Entity) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        self.validate_at(entity, entity.type_name(), &MemberPath::root(), &mut results);
        results
    }

    fn validate_at(
        &self,
        entity: &Entity,
        type_name: &str,
        path: &MemberPath,
        out: &mut Vec<ValidationResult>,
    ) {
        let Some(descriptor) = self.schema.descriptor(type_name) else {
            return;
        };
        let fields = entity.fields();

        for member in descriptor.members() {
            let value = fields.get(&member.name);

            for rule in &member.rules {
                if let Some(message) = rule.evaluate(&member.name, value) {
                    out.push(ValidationResult::new(message, [path.join(&member.name)]));
                }
            }

            match &member.kind {
                MemberKind::Composite { type_name } => {
                    if let Some(Value::Object(map)) = value {
                        let nested = materialize(type_name, map);
                        self.validate_at(&nested, type_name, &path.enter(&member.name), out);
                    }
                }
                MemberKind::CompositeList { type_name } => {
                    if let Some(Value::Array(items)) = value {
                        // One positional-agnostic path covers all elements.
                        let element_path = path.enter_collection(&member.name);
                        for item in items {
                            if let Value::Object(map) = item {
                                let nested = materialize(type_name, map);
                                self.validate_at(&nested, type_name, &element_path, out);
                            }
                        }
                    }
                }
                MemberKind::Scalar | MemberKind::Association { .. } => {}
            }
        }

        for rule in descriptor.object_rules() {
            for mut result in rule(entity) {
                if !path.is_root() {
                    result.member_names = result
                        .member_names
                        .iter()
                        .map(|name| path.join(name))
                        .collect();
                }
                out.push(result);
            }
        }
    }
}

fn materialize(type_name: &str, map: &serde_json::Map<String, Value>) -> Entity {
    let entity = Entity::new(type_name);
    for (name, value) in map {
        entity.set(name.clone(), value.clone());
    }
    entity
}
