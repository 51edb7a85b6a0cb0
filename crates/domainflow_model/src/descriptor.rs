//! Type and member descriptors.

use crate::{Entity, ValidationResult, ValidationRule};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What kind of member a descriptor declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    /// A plain scalar value (string, number, boolean).
    Scalar,
    /// A nested composite value validated as an instance of `type_name`.
    Composite {
        /// The composite's declared type.
        type_name: String,
    },
    /// An ordered collection of composite values of `type_name`.
    CompositeList {
        /// The element type.
        type_name: String,
    },
    /// A navigation relationship to other entities, encoded in a change set
    /// as an id list.
    Association {
        /// True for an ordered collection, false for a singleton reference.
        collection: bool,
    },
}

impl MemberKind {
    /// Returns true if this member can carry association id-lists.
    pub fn is_association(&self) -> bool {
        matches!(self, MemberKind::Association { .. })
    }

    /// Returns the composite element type, if this member is composite.
    pub fn composite_type(&self) -> Option<&str> {
        match self {
            MemberKind::Composite { type_name } | MemberKind::CompositeList { type_name } => {
                Some(type_name)
            }
            _ => None,
        }
    }
}

/// A single declared member of an entity type.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// Member name.
    pub name: String,
    /// Member kind.
    pub kind: MemberKind,
    /// Property-level validation rules, evaluated in declaration order.
    pub rules: Vec<ValidationRule>,
}

impl MemberDescriptor {
    /// Creates a member descriptor with no rules.
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
            rules: Vec::new(),
        }
    }

    /// Adds a validation rule.
    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// An object-level validator callback, run against the whole entity.
pub type ObjectRule = Arc<dyn Fn(&Entity) -> Vec<ValidationResult> + Send + Sync>;

/// The declared shape of one entity type.
#[derive(Clone)]
pub struct TypeDescriptor {
    name: String,
    members: Vec<MemberDescriptor>,
    object_rules: Vec<ObjectRule>,
}

impl TypeDescriptor {
    /// Creates an empty descriptor for the given type name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            object_rules: Vec::new(),
        }
    }

    /// Adds a member.
    pub fn with_member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Adds an object-level validator callback.
    pub fn with_object_rule(
        mut self,
        rule: impl Fn(&Entity) -> Vec<ValidationResult> + Send + Sync + 'static,
    ) -> Self {
        self.object_rules.push(Arc::new(rule));
        self
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared members, in declaration order.
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    /// Looks up a member by name.
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Returns the object-level validator callbacks.
    pub fn object_rules(&self) -> &[ObjectRule] {
        &self.object_rules
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("members", &self.members)
            .field("object_rules", &self.object_rules.len())
            .finish()
    }
}

/// Registry of type descriptors, shared by the change set (association
/// capability checks) and the validation engine (recursive descent).
///
/// Built once at startup, then shared immutably via `Arc`.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type descriptor, replacing any previous one by that name.
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name().to_string(), descriptor);
    }

    /// Registers a type descriptor, builder-style.
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Looks up a type descriptor by name.
    pub fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    /// Returns true if `member` is declared as an association on `type_name`.
    pub fn is_association(&self, type_name: &str, member: &str) -> bool {
        self.descriptor(type_name)
            .and_then(|t| t.member(member))
            .map(|m| m.kind.is_association())
            .unwrap_or(false)
    }
}
