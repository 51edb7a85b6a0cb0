//! Validation rules and results.

use crate::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single validation failure: a message plus the member paths it applies to.
///
/// Member paths are dotted segments; a `()` marker denotes traversal through
/// a collection member (e.g. `Order.Lines().Quantity`), matching every
/// element rather than a specific index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Human-readable failure message.
    pub message: String,
    /// Member-name paths the failure applies to, in declaration order.
    pub member_names: Vec<String>,
}

impl ValidationResult {
    /// Creates a validation result for the given member paths.
    pub fn new(
        message: impl Into<String>,
        member_names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            message: message.into(),
            member_names: member_names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Signature for custom property-level rules.
///
/// Receives the member value (`Value::Null` when the member is unset) and
/// returns a failure message, or `None` when the value is acceptable.
pub type CustomRuleFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// A property-level validation rule declared on a member descriptor.
#[derive(Clone)]
pub enum ValidationRule {
    /// The member must be present and non-null.
    Required,
    /// A string member's length must fall within `min..=max`.
    StringLength {
        /// Minimum length, inclusive.
        min: usize,
        /// Maximum length, inclusive.
        max: usize,
    },
    /// A numeric member must fall within `min..=max`.
    Range {
        /// Minimum value, inclusive.
        min: f64,
        /// Maximum value, inclusive.
        max: f64,
    },
    /// A named custom check.
    Custom {
        /// Rule name, used in diagnostics.
        name: String,
        /// The check itself.
        check: CustomRuleFn,
    },
}

impl ValidationRule {
    /// Creates a named custom rule.
    pub fn custom(
        name: impl Into<String>,
        check: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Evaluates the rule against a member value.
    ///
    /// Returns a failure message, or `None` if the value passes. Rules other
    /// than [`ValidationRule::Required`] treat a missing or null value as
    /// passing; presence is `Required`'s concern.
    pub fn evaluate(&self, member: &str, value: Option<&Value>) -> Option<String> {
        match self {
            ValidationRule::Required => match value {
                None | Some(Value::Null) => Some(format!("member '{member}' is required")),
                Some(_) => None,
            },
            ValidationRule::StringLength { min, max } => {
                let text = value.and_then(Value::as_str)?;
                let len = text.chars().count();
                if len < *min || len > *max {
                    Some(format!(
                        "member '{member}' length {len} is outside {min}..={max}"
                    ))
                } else {
                    None
                }
            }
            ValidationRule::Range { min, max } => {
                let number = value.and_then(Value::as_f64)?;
                if number < *min || number > *max {
                    Some(format!(
                        "member '{member}' value {number} is outside {min}..={max}"
                    ))
                } else {
                    None
                }
            }
            ValidationRule::Custom { check, .. } => {
                let unset = Value::Null;
                check(value.unwrap_or(&unset))
            }
        }
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Required => write!(f, "Required"),
            ValidationRule::StringLength { min, max } => {
                write!(f, "StringLength({min}..={max})")
            }
            ValidationRule::Range { min, max } => write!(f, "Range({min}..={max})"),
            ValidationRule::Custom { name, .. } => write!(f, "Custom({name})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_rejects_missing_and_null() {
        assert!(ValidationRule::Required.evaluate("Name", None).is_some());
        assert!(ValidationRule::Required
            .evaluate("Name", Some(&Value::Null))
            .is_some());
        assert!(ValidationRule::Required
            .evaluate("Name", Some(&json!("x")))
            .is_none());
    }

    #[test]
    fn string_length_bounds() {
        let rule = ValidationRule::StringLength { min: 2, max: 4 };
        assert!(rule.evaluate("Name", Some(&json!("a"))).is_some());
        assert!(rule.evaluate("Name", Some(&json!("ab"))).is_none());
        assert!(rule.evaluate("Name", Some(&json!("abcde"))).is_some());
        // Presence is Required's concern.
        assert!(rule.evaluate("Name", None).is_none());
        // Non-strings are not this rule's concern.
        assert!(rule.evaluate("Name", Some(&json!(5))).is_none());
    }

    #[test]
    fn range_bounds() {
        let rule = ValidationRule::Range { min: 0.0, max: 10.0 };
        assert!(rule.evaluate("Total", Some(&json!(-1))).is_some());
        assert!(rule.evaluate("Total", Some(&json!(5))).is_none());
        assert!(rule.evaluate("Total", Some(&json!(10.5))).is_some());
        assert!(rule.evaluate("Total", None).is_none());
    }

    #[test]
    fn custom_rule_sees_null_for_missing() {
        let rule = ValidationRule::custom("no-nulls", |value| {
            value.is_null().then(|| "value is null".to_string())
        });
        assert_eq!(
            rule.evaluate("Any", None),
            Some("value is null".to_string())
        );
        assert!(rule.evaluate("Any", Some(&json!(1))).is_none());
    }

    #[test]
    fn validation_result_construction() {
        let result = ValidationResult::new("bad", ["A", "B"]);
        assert_eq!(result.member_names, vec!["A", "B"]);
    }
}
