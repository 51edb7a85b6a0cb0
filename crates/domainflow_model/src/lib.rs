//! # DomainFlow Model
//!
//! Dynamic entity model and type metadata for DomainFlow.
//!
//! This crate provides:
//! - A reference-identity entity handle with an interior-mutable field map
//! - Type and member descriptors (scalar, composite, association members)
//! - The validation-rule vocabulary evaluated by the validation engine
//!
//! ## Identity Semantics
//!
//! All correlation in DomainFlow is by **identity**, never by value: two
//! [`Entity`] handles refer to the same entity if and only if they share the
//! same allocation ([`Entity::same`]). Cloning a handle is cheap and does not
//! copy the entity; use [`Entity::deep_clone`] for a detached snapshot.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod descriptor;
mod entity;
mod rules;

pub use descriptor::{MemberDescriptor, MemberKind, ObjectRule, SchemaRegistry, TypeDescriptor};
pub use entity::Entity;
pub use rules::{CustomRuleFn, ValidationResult, ValidationRule};

/// The dynamic value type used for entity fields and action arguments.
pub type Value = serde_json::Value;
