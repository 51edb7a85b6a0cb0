//! # DomainFlow Pipeline
//!
//! Staged change-set submission pipeline for DomainFlow.
//!
//! This crate provides:
//! - Pipeline state machine (initialize → authorize → validate → execute → persist)
//! - Principals and declarative authorization rules
//! - Operation catalog abstraction with an in-memory implementation
//! - Persistence provider abstraction with conflict reporting
//! - Cancellation at stage boundaries
//! - An error hook for rewriting fatal errors before they surface
//!
//! ## Architecture
//!
//! One pipeline instance drives one change set through strictly sequential
//! stages, visiting entries in declared order at every stage. Failures flow
//! through two distinct channels:
//! 1. Continuable outcomes (validation errors, store conflicts) are
//!    recorded on the affected entries and returned as part of the
//!    completed change set
//! 2. Fatal errors abort the submission, move the pipeline to the faulted
//!    state, and pass exactly once through the error hook
//!
//! ## Key Invariants
//!
//! - `initialize` may be called exactly once per instance
//! - Authorization denial aborts before any operation executes
//! - Validation errors on one entry never stop a sibling's validation
//! - Persistence runs only when no entry carries an error
//! - Store transforms apply only after a clean persist

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod catalog;
mod config;
mod error;
mod persistence;
mod pipeline;

pub use auth::{permits_all, AuthRule, Principal};
pub use catalog::{
    BoundOperation, MemoryOperationCatalog, OperationCatalog, OperationContext, OperationError,
    OperationFn,
};
pub use config::{ErrorPolicy, PipelineConfig};
pub use error::{ErrorHook, PipelineError, PipelineResult};
pub use persistence::{CancelToken, MemoryPersistence, PersistenceProvider};
pub use pipeline::{PipelineState, ServiceKind, SubmitPipeline};
