//! # Special filter tokens.
//!
//! Tokens test presence/emptiness instead of comparing text:
//!
//! ```text
//! token     absent  null   ""     "  "   "bear"
//! key       no      yes    yes    yes    yes
//! value     no      no     yes    yes    yes
//! present   no      no     no     no     yes
//! blank     yes     yes    yes    yes    no
//! empty     no      no     yes    no     no
//! nil       yes     yes    no     no     no
//! ```

use serde_json::Value;

use crate::attributes::stringify;

/// Prefix marking a special token in the persisted form.
pub const SPECIAL_PREFIX: &str = "bus_special_value_";

/// Presence/emptiness test on one attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Special {
    /// Attribute name is present, any value including null.
    Key,
    /// Present with a non-null value, even `""`.
    Value,
    /// Stringified value is non-blank after trimming.
    Present,
    /// Absent, null, or blank after trimming.
    Blank,
    /// Non-null and stringifies to exactly `""`.
    Empty,
    /// Absent or null.
    Nil,
}

impl Special {
    /// Token name without prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Special::Key => "key",
            Special::Value => "value",
            Special::Present => "present",
            Special::Blank => "blank",
            Special::Empty => "empty",
            Special::Nil => "nil",
        }
    }

    /// Parses a bare token name (`"blank"`, not the prefixed form).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "key" => Some(Special::Key),
            "value" => Some(Special::Value),
            "present" => Some(Special::Present),
            "blank" => Some(Special::Blank),
            "empty" => Some(Special::Empty),
            "nil" => Some(Special::Nil),
            _ => None,
        }
    }

    /// Persisted form, e.g. `bus_special_value_blank`.
    pub fn to_wire(&self) -> String {
        format!("{SPECIAL_PREFIX}{}", self.as_str())
    }

    /// Parses the persisted form.
    pub fn from_wire(s: &str) -> Option<Self> {
        s.strip_prefix(SPECIAL_PREFIX).and_then(Self::parse)
    }

    /// Evaluates the token. `present` tells whether the attribute name exists at all.
    pub fn accepts(&self, present: bool, given: Option<&Value>) -> bool {
        let is_nil = matches!(given, None | Some(Value::Null));
        match self {
            Special::Key => present,
            Special::Value => !is_nil,
            Special::Nil => is_nil,
            Special::Blank => stringify(given).trim().is_empty(),
            Special::Present => !stringify(given).trim().is_empty(),
            Special::Empty => !is_nil && stringify(given).is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(token: Special, given: Option<Value>) -> bool {
        token.accepts(given.is_some(), given.as_ref())
    }

    fn row(token: Special) -> [bool; 5] {
        [
            eval(token, None),
            eval(token, Some(Value::Null)),
            eval(token, Some(json!(""))),
            eval(token, Some(json!("  "))),
            eval(token, Some(json!("bear"))),
        ]
    }

    #[test]
    fn test_truth_table() {
        assert_eq!(row(Special::Key), [false, true, true, true, true]);
        assert_eq!(row(Special::Value), [false, false, true, true, true]);
        assert_eq!(row(Special::Present), [false, false, false, false, true]);
        assert_eq!(row(Special::Blank), [true, true, true, true, false]);
        assert_eq!(row(Special::Empty), [false, false, true, false, false]);
        assert_eq!(row(Special::Nil), [true, true, false, false, false]);
    }

    #[test]
    fn test_blank_rejects_padded_text() {
        assert!(!eval(Special::Blank, Some(json!("   s "))));
        assert!(eval(Special::Value, Some(json!("   s "))));
        assert!(!eval(Special::Empty, Some(json!("   s "))));
    }

    #[test]
    fn test_wire_prefix() {
        assert_eq!(Special::Nil.to_wire(), "bus_special_value_nil");
        assert_eq!(Special::from_wire("bus_special_value_key"), Some(Special::Key));
        assert_eq!(Special::from_wire("bus_special_value_other"), None);
        assert_eq!(Special::from_wire("key"), None);
    }
}
