//! # DomainFlow Testkit
//!
//! Test utilities for DomainFlow.
//!
//! This crate provides:
//! - A small order-entry fixture schema with composite and association members
//! - Entity and change-set builders for common submission scenarios
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use domainflow_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_fixture_set() {
//!     let (set, parent) = order_with_lines();
//!     // ... exercise association and correlation queries
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
