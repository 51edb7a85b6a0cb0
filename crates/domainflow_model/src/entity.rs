//! The reference-identity entity handle.

use crate::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

struct EntityInner {
    type_name: String,
    fields: RwLock<BTreeMap<String, Value>>,
}

/// A dynamic entity instance with stable identity semantics.
///
/// An `Entity` is a cheap handle over a shared allocation: cloning it yields
/// another handle to the **same** entity, and [`Entity::same`] compares
/// handles by allocation rather than by content. The type name is fixed at
/// construction; the field map may be mutated through any handle.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    /// Creates a new, empty entity of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                type_name: type_name.into(),
                fields: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Sets a field and returns the entity, for builder-style construction.
    pub fn with_field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Returns the entity's runtime type name.
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    /// Returns true if both handles refer to the same entity allocation.
    ///
    /// This is the only equality DomainFlow ever uses for entity lookup.
    pub fn same(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Gets a field value, if present.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.fields.read().get(name).cloned()
    }

    /// Sets a field value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.fields.write().insert(name.into(), value.into());
    }

    /// Removes a field, returning its previous value if it was set.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.inner.fields.write().remove(name)
    }

    /// Returns a snapshot of all fields, ordered by member name.
    pub fn fields(&self) -> BTreeMap<String, Value> {
        self.inner.fields.read().clone()
    }

    /// Creates a detached copy with the same type and field values.
    ///
    /// The copy is a distinct entity: `self.same(&copy)` is false.
    pub fn deep_clone(&self) -> Entity {
        Self {
            inner: Arc::new(EntityInner {
                type_name: self.inner.type_name.clone(),
                fields: RwLock::new(self.inner.fields.read().clone()),
            }),
        }
    }

    /// Returns true if any scalar member differs between the two entities.
    ///
    /// Composite members (objects) and collection members (arrays) are
    /// ignored; a member present on one side and absent on the other counts
    /// as a difference.
    pub fn scalar_members_differ(&self, other: &Entity) -> bool {
        let a = self.inner.fields.read();
        let b = other.inner.fields.read();

        let is_scalar = |v: &Value| !v.is_object() && !v.is_array();

        for (name, value) in a.iter() {
            if !is_scalar(value) {
                continue;
            }
            match b.get(name) {
                Some(other_value) if is_scalar(other_value) => {
                    if value != other_value {
                        return true;
                    }
                }
                Some(_) => return true,
                None => return true,
            }
        }

        // Scalars present only on the other side.
        b.iter()
            .any(|(name, value)| is_scalar(value) && !a.contains_key(name))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type_name", &self.inner.type_name)
            .field("fields", &*self.inner.fields.read())
            .finish()
    }
}
