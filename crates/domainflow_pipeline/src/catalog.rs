//! The operation catalog: resolved, invocable domain operations.

use crate::auth::{permits_all, AuthRule, Principal};
use domainflow_changeset::{ChangeEntry, ChangeSet, NamedAction, Operation};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Everything an operation author may touch while executing.
///
/// Exposes the acting principal and the change set's full correlation
/// surface (`original_of`, `replace`, `associate`, `associated_changes`).
/// Only available during the Executing stage.
pub struct OperationContext<'a> {
    principal: &'a Principal,
    change_set: &'a ChangeSet,
}

impl<'a> OperationContext<'a> {
    /// Creates a context for one executing stage.
    pub fn new(principal: &'a Principal, change_set: &'a ChangeSet) -> Self {
        Self {
            principal,
            change_set,
        }
    }

    /// The principal the pipeline was initialized with.
    pub fn principal(&self) -> &Principal {
        self.principal
    }

    /// The change set being executed, including correlation services.
    pub fn change_set(&self) -> &ChangeSet {
        self.change_set
    }
}

/// Failure raised from inside an operation body.
///
/// The two variants are the two failure channels and must stay distinct:
/// a domain validation failure is **continuable** (converted into an entry
/// validation error, siblings keep executing) while anything else is
/// **fatal** (routed through the error hook, pipeline aborts).
#[derive(Debug, Error)]
pub enum OperationError {
    /// A domain-level validation failure; continuable.
    #[error("{message}")]
    Validation {
        /// The failure message.
        message: String,
        /// Member names the failure applies to.
        members: Vec<String>,
    },

    /// Any other failure; fatal.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl OperationError {
    /// Creates a continuable domain validation failure.
    pub fn validation(
        message: impl Into<String>,
        members: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a fatal operation failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Signature of an operation body.
pub type OperationFn = Arc<
    dyn Fn(&OperationContext<'_>, &ChangeEntry, &[NamedAction]) -> Result<(), OperationError>
        + Send
        + Sync,
>;

/// A resolved domain operation: name, authorization rules, and body.
///
/// Resolution happens exactly once per entry, during the Authorizing
/// stage; the Executing stage reuses the resolved handle.
#[derive(Clone)]
pub struct BoundOperation {
    name: String,
    auth_rules: Vec<AuthRule>,
    body: OperationFn,
}

impl BoundOperation {
    /// Creates a bound operation with no authorization rules.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&OperationContext<'_>, &ChangeEntry, &[NamedAction]) -> Result<(), OperationError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            auth_rules: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Adds an authorization rule, builder-style.
    pub fn with_auth_rule(mut self, rule: AuthRule) -> Self {
        self.auth_rules.push(rule);
        self
    }

    /// The operation's name, used in denial and failure errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates this operation's authorization rules.
    pub fn authorize(&self, principal: &Principal) -> bool {
        permits_all(&self.auth_rules, principal)
    }

    /// Invokes the operation body.
    pub fn invoke(
        &self,
        context: &OperationContext<'_>,
        entry: &ChangeEntry,
        actions: &[NamedAction],
    ) -> Result<(), OperationError> {
        (self.body)(context, entry, actions)
    }
}

impl fmt::Debug for BoundOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundOperation")
            .field("name", &self.name)
            .field("auth_rules", &self.auth_rules)
            .finish()
    }
}

/// Supplies resolved operations for entity types and operation kinds.
///
/// Supplied externally to the pipeline; typically backed by generated
/// scaffolding. Returning `None` makes the submission fail fast with an
/// unknown-operation error during Authorizing.
pub trait OperationCatalog: Send + Sync {
    /// Resolves the operation handling `operation` for `entity_type`.
    fn resolve(&self, entity_type: &str, operation: Operation) -> Option<Arc<BoundOperation>>;
}

/// An in-memory, register-by-hand operation catalog.
#[derive(Debug, Default)]
pub struct MemoryOperationCatalog {
    operations: RwLock<HashMap<(String, Operation), Arc<BoundOperation>>>,
}

impl MemoryOperationCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation for an entity type and operation kind.
    pub fn register(
        &self,
        entity_type: impl Into<String>,
        operation: Operation,
        bound: BoundOperation,
    ) {
        self.operations
            .write()
            .insert((entity_type.into(), operation), Arc::new(bound));
    }
}

impl OperationCatalog for MemoryOperationCatalog {
    fn resolve(&self, entity_type: &str, operation: Operation) -> Option<Arc<BoundOperation>> {
        self.operations
            .read()
            .get(&(entity_type.to_string(), operation))
            .cloned()
    }
}
