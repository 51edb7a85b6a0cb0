//! Error types for the submission pipeline.

use domainflow_changeset::{ChangeSetError, Operation};
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal, pipeline-aborting errors.
///
/// Continuable outcomes (validation failures, store conflicts) are never
/// represented here; they live on change entries. Anything of this type
/// aborts the submission, and any instance raised during `submit` is routed
/// exactly once through the error hook before being returned.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Structural or correlation failure from the change set layer.
    #[error("change set error: {0}")]
    ChangeSet(#[from] ChangeSetError),

    /// `initialize` was called a second time.
    #[error("pipeline is already initialized")]
    AlreadyInitialized,

    /// `submit` was called before `initialize`.
    #[error("pipeline is not initialized")]
    NotInitialized,

    /// `submit` was called from a state that cannot accept a change set.
    #[error("pipeline cannot submit from state {state}")]
    InvalidState {
        /// The state the pipeline was in.
        state: String,
    },

    /// The submitted change set was empty.
    #[error("cannot submit an empty change set")]
    EmptyChangeSet,

    /// The submitted change set exceeds the configured batch cap.
    #[error("change set has {actual} entries, exceeding the maximum of {max}")]
    TooManyEntries {
        /// Configured cap.
        max: usize,
        /// Entries submitted.
        actual: usize,
    },

    /// No operation is registered for an entry's type and operation kind.
    #[error("no operation registered for type '{entity_type}' ({operation})")]
    UnknownOperation {
        /// The entity type.
        entity_type: String,
        /// The operation kind.
        operation: Operation,
    },

    /// An authorization rule rejected the principal.
    #[error("access to operation '{operation}' was denied")]
    AccessDenied {
        /// Name of the denied operation.
        operation: String,
    },

    /// An operation failed with an unclassified error.
    #[error("operation '{operation}' failed: {message}")]
    OperationFailed {
        /// Name of the failing operation.
        operation: String,
        /// Description of the failure; the error hook may rewrite this.
        message: String,
    },

    /// The persistence provider failed outright.
    #[error("persistence failed: {message}")]
    Persistence {
        /// Description of the failure.
        message: String,
    },

    /// The submission was cancelled at a stage boundary.
    #[error("submission cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Creates an access-denied error.
    pub fn access_denied(operation: impl Into<String>) -> Self {
        Self::AccessDenied {
            operation: operation.into(),
        }
    }

    /// Creates an unknown-operation error.
    pub fn unknown_operation(entity_type: impl Into<String>, operation: Operation) -> Self {
        Self::UnknownOperation {
            entity_type: entity_type.into(),
            operation,
        }
    }

    /// Creates an operation-failed error.
    pub fn operation_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }
}

/// Hook invoked exactly once for any fatal error raised during `submit`.
///
/// The hook may rewrite the error (typically its message) but cannot
/// suppress it: it must hand an error back, which the pipeline then
/// returns. Continuable outcomes never reach the hook.
pub type ErrorHook = Box<dyn Fn(PipelineError) -> PipelineError + Send + Sync>;
