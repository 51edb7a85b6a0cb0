//! Member-name path assembly.

use std::fmt;

/// A dotted member path built while descending an entity graph.
///
/// Collection traversal appends a `()` marker to the collection member's
/// segment: `Order.Lines().Quantity` names `Quantity` on *an element* of
/// `Lines`, not a specific index. The marker is positional-agnostic by
/// design and matches all elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPath {
    prefix: String,
}

impl MemberPath {
    /// The root path (no prefix; top-level members render as bare names).
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns true if this is the root path.
    pub fn is_root(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Renders the full path for a member at this level.
    pub fn join(&self, member: &str) -> String {
        if self.prefix.is_empty() {
            member.to_string()
        } else {
            format!("{}.{member}", self.prefix)
        }
    }

    /// Descends into a composite member.
    pub fn enter(&self, member: &str) -> Self {
        Self {
            prefix: self.join(member),
        }
    }

    /// Descends into a collection member, appending the `()` marker.
    pub fn enter_collection(&self, member: &str) -> Self {
        Self {
            prefix: format!("{}()", self.join(member)),
        }
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}
