//! Error types for change set construction and correlation.

use crate::entry::Operation;
use thiserror::Error;

/// Result type for change set operations.
pub type ChangeSetResult<T> = Result<T, ChangeSetError>;

/// Errors raised by change set construction and the correlation services.
///
/// Every variant here is **fatal** from the pipeline's point of view.
/// Continuable failures (validation results, conflict members) are recorded
/// on entries and are deliberately not part of this type.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    /// Two entries share the same caller-assigned id.
    #[error("duplicate change entry id {id}")]
    DuplicateId {
        /// The repeated id.
        id: u64,
    },

    /// An association id-list references an id with no owning entry.
    #[error("association '{member}' on entry {entry_id} references id {id} which is not in the change set")]
    AssociationIdNotFound {
        /// The entry declaring the association.
        entry_id: u64,
        /// The association member name.
        member: String,
        /// The dangling id.
        id: u64,
    },

    /// An insert entry carries an original snapshot.
    #[error("entry {id} is an insert but carries an original snapshot")]
    OriginalOnInsert {
        /// The offending entry.
        id: u64,
    },

    /// An update or delete entry is missing its original snapshot.
    #[error("entry {id} ({operation}) requires an original snapshot")]
    MissingOriginal {
        /// The offending entry.
        id: u64,
        /// The entry's operation.
        operation: Operation,
    },

    /// An entry's current and original snapshots have different runtime types.
    #[error("entry {id} snapshot types differ: entity is '{entity_type}', original is '{original_type}'")]
    SnapshotTypeMismatch {
        /// The offending entry.
        id: u64,
        /// Type of the current snapshot.
        entity_type: String,
        /// Type of the original snapshot.
        original_type: String,
    },

    /// A wire entry arrived without an entity snapshot.
    #[error("entry {id} is missing its entity snapshot")]
    MissingEntity {
        /// The offending entry.
        id: u64,
    },

    /// A wire entry carried an unknown operation code.
    #[error("entry {id} has invalid operation code {code}")]
    InvalidOperationCode {
        /// The offending entry.
        id: u64,
        /// The unrecognized code.
        code: u8,
    },

    /// A correlation argument does not identify any entry's entity.
    #[error("entity not found in the change set")]
    EntityNotFound,

    /// Every entry matching the entity lacks an original snapshot.
    #[error("entry {id} has no original state")]
    NoOriginalState {
        /// The first matching entry.
        id: u64,
    },

    /// The named member is not declared as an association.
    #[error("member '{member}' on type '{type_name}' is not an association")]
    NotAnAssociation {
        /// The entity type inspected.
        type_name: String,
        /// The non-association member.
        member: String,
    },

    /// `replace` was called with an instance of a different runtime type.
    #[error("cannot replace an entity of type '{current}' with an instance of type '{replacement}'")]
    ReplacementTypeMismatch {
        /// Type of the entity being replaced.
        current: String,
        /// Type of the proposed replacement.
        replacement: String,
    },

    /// A deferred store-entity transform failed.
    #[error("store entity transform failed: {message}")]
    TransformFailed {
        /// Description of the failure.
        message: String,
    },
}

impl ChangeSetError {
    /// Creates a dangling-association error.
    pub fn association_id_not_found(entry_id: u64, member: impl Into<String>, id: u64) -> Self {
        Self::AssociationIdNotFound {
            entry_id,
            member: member.into(),
            id,
        }
    }

    /// Creates a not-an-association error.
    pub fn not_an_association(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::NotAnAssociation {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    /// Creates a replacement type-mismatch error.
    pub fn replacement_type_mismatch(
        current: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self::ReplacementTypeMismatch {
            current: current.into(),
            replacement: replacement.into(),
        }
    }

    /// Creates a transform failure error.
    pub fn transform_failed(message: impl Into<String>) -> Self {
        Self::TransformFailed {
            message: message.into(),
        }
    }
}
