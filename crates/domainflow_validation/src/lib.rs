//! # DomainFlow Validation
//!
//! Deep, path-aware validation over entity graphs.
//!
//! This crate provides:
//! - [`EntityValidator`]: property-level and object-level checks driven by
//!   the schema registry, with recursive descent into composite members and
//!   composite collections
//! - [`MemberPath`]: dotted member paths with a positional-agnostic `()`
//!   marker for collection traversal (`Order.Lines().Quantity`)
//!
//! Validation output is the **continuable** failure channel: failures are
//! accumulated as `ValidationResult`s, never raised, and never unified with
//! the fatal error channel.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod path;

pub use engine::EntityValidator;
pub use path::MemberPath;
