//! # DomainFlow Change Set
//!
//! The change-set graph for batched entity submissions.
//!
//! This crate provides:
//! - [`ChangeEntry`]: one mutation record (snapshots, operation, flattened
//!   association deltas)
//! - [`ChangeSet`]: the ordered batch with structural graph invariants
//! - Association resolution over the flattened id-reference encoding
//! - Correlation services for operation authors (`original_of`, `replace`,
//!   `associate`, deferred store-entity transforms, reverse lookup)
//! - Wire DTOs bridging the transport layer and the in-memory graph
//!
//! ## Key Invariants
//!
//! - Entry ids are unique within a set
//! - The association id-reference graph is closed over the set
//! - Inserts carry no original snapshot; updates and deletes must
//! - An entry's snapshots share one runtime type
//! - Construction is the only structural checkpoint; afterwards ids,
//!   types, and operations are fixed while entity content may mutate
//!
//! Continuable failures (validation results, conflict members) live on
//! entries; everything in [`ChangeSetError`] is fatal. The two channels are
//! deliberately distinct types.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod associations;
mod correlation;
mod entry;
mod error;
mod set;
mod wire;

pub use entry::{ChangeEntry, NamedAction, Operation};
pub use error::{ChangeSetError, ChangeSetResult};
pub use set::{ChangeSet, TransformFn};
pub use wire::{build_change_set, to_response, ChangeEntryDto};
