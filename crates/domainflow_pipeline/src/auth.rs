//! Principals and authorization rules.

use std::collections::BTreeSet;

/// The user a pipeline instance acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    name: Option<String>,
    authenticated: bool,
    roles: BTreeSet<String>,
}

impl Principal {
    /// Creates an anonymous, unauthenticated principal.
    pub fn anonymous() -> Self {
        Self {
            name: None,
            authenticated: false,
            roles: BTreeSet::new(),
        }
    }

    /// Creates an authenticated principal with the given name.
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            authenticated: true,
            roles: BTreeSet::new(),
        }
    }

    /// Adds a role, builder-style.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// The principal's name, if authenticated.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns true if the principal is authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns true if the principal carries the given role.
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// A declarative authorization rule attached to a bound operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRule {
    /// The principal must be authenticated.
    RequireAuthentication,
    /// The principal must carry the given role.
    RequireRole(String),
    /// Nobody is permitted (useful to fence off an operation).
    DenyAll,
}

impl AuthRule {
    /// Returns true if the rule permits the principal.
    pub fn permits(&self, principal: &Principal) -> bool {
        match self {
            AuthRule::RequireAuthentication => principal.is_authenticated(),
            AuthRule::RequireRole(role) => principal.is_in_role(role),
            AuthRule::DenyAll => false,
        }
    }
}

/// Evaluates a rule set against a principal.
///
/// Every rule must permit; the first unsatisfied rule denies. An empty rule
/// set permits everyone.
pub fn permits_all(rules: &[AuthRule], principal: &Principal) -> bool {
    rules.iter().all(|rule| rule.permits(principal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_principal() {
        let principal = Principal::anonymous();
        assert!(!principal.is_authenticated());
        assert_eq!(principal.name(), None);
        assert!(!principal.is_in_role("admin"));
    }

    #[test]
    fn authenticated_with_roles() {
        let principal = Principal::authenticated("kim").with_role("clerk");
        assert!(principal.is_authenticated());
        assert_eq!(principal.name(), Some("kim"));
        assert!(principal.is_in_role("clerk"));
        assert!(!principal.is_in_role("admin"));
    }

    #[test]
    fn rule_evaluation() {
        let clerk = Principal::authenticated("kim").with_role("clerk");
        let anon = Principal::anonymous();

        assert!(AuthRule::RequireAuthentication.permits(&clerk));
        assert!(!AuthRule::RequireAuthentication.permits(&anon));
        assert!(AuthRule::RequireRole("clerk".into()).permits(&clerk));
        assert!(!AuthRule::RequireRole("admin".into()).permits(&clerk));
        assert!(!AuthRule::DenyAll.permits(&clerk));
    }

    #[test]
    fn empty_rule_set_permits_everyone() {
        assert!(permits_all(&[], &Principal::anonymous()));
    }

    #[test]
    fn first_unsatisfied_rule_denies() {
        let rules = [
            AuthRule::RequireAuthentication,
            AuthRule::RequireRole("admin".into()),
        ];
        let clerk = Principal::authenticated("kim").with_role("clerk");
        let admin = Principal::authenticated("max").with_role("admin");

        assert!(!permits_all(&rules, &clerk));
        assert!(permits_all(&rules, &admin));
    }
}
