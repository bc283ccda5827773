//! # One filter entry.
//!
//! [`FilterSpec`] is either a [`Special`] token or text. Text is compared to the
//! stringified attribute for equality first; otherwise it is evaluated as a regex:
//! text starting with `(?-mix:` is used as written (unanchored), anything else is
//! anchored as `^text$`. A regex that fails to compile never matches.

use std::fmt;

use regex::Regex;

use super::special::Special;
use crate::attributes::{stringify, Attributes};

const PATTERN_PREFIX: &str = "(?-mix:";

/// Filter applied to a single attribute.
#[derive(Clone)]
pub enum FilterSpec {
    /// Presence/emptiness token.
    Special(Special),
    /// Literal or pattern text, with its regex compiled up front.
    Text {
        /// Text exactly as persisted.
        raw: String,
        /// Compiled form; `None` when the text is not a valid regex.
        regex: Option<Regex>,
    },
}

impl FilterSpec {
    /// Text filter: exact equality, else regex anchored `^text$`.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::text(text.into())
    }

    /// Pattern filter: the regex is used unanchored, exactly as written.
    pub fn pattern(re: &Regex) -> Self {
        let src = re.as_str();
        if src.starts_with(PATTERN_PREFIX) {
            Self::text(src.to_string())
        } else {
            Self::text(format!("{PATTERN_PREFIX}{src})"))
        }
    }

    /// Decodes the persisted form.
    pub fn from_wire(raw: &str) -> Self {
        match Special::from_wire(raw) {
            Some(token) => FilterSpec::Special(token),
            None => Self::text(raw.to_string()),
        }
    }

    /// Persisted form.
    pub fn to_wire(&self) -> String {
        match self {
            FilterSpec::Special(token) => token.to_wire(),
            FilterSpec::Text { raw, .. } => raw.clone(),
        }
    }

    /// Evaluates this filter against attribute `name` of `attributes`.
    pub fn accepts(&self, name: &str, attributes: &Attributes) -> bool {
        let given = attributes.get(name);
        match self {
            FilterSpec::Special(token) => token.accepts(attributes.contains_key(name), given),
            FilterSpec::Text { raw, regex } => {
                if raw.is_empty() {
                    return false;
                }
                let given = stringify(given);
                if *raw == given {
                    return true;
                }
                regex.as_ref().is_some_and(|re| re.is_match(&given))
            }
        }
    }

    fn text(raw: String) -> Self {
        let regex = if raw.is_empty() {
            None
        } else if raw.starts_with(PATTERN_PREFIX) {
            Regex::new(&raw).ok()
        } else {
            Regex::new(&format!("^{raw}$")).ok()
        };
        FilterSpec::Text { raw, regex }
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSpec::Special(token) => f.debug_tuple("Special").field(token).finish(),
            FilterSpec::Text { raw, .. } => f.debug_tuple("Text").field(raw).finish(),
        }
    }
}

impl PartialEq for FilterSpec {
    fn eq(&self, other: &Self) -> bool {
        self.to_wire() == other.to_wire()
    }
}

impl Eq for FilterSpec {}

impl From<Special> for FilterSpec {
    fn from(token: Special) -> Self {
        FilterSpec::Special(token)
    }
}

impl From<&str> for FilterSpec {
    fn from(text: &str) -> Self {
        FilterSpec::literal(text)
    }
}

impl From<String> for FilterSpec {
    fn from(text: String) -> Self {
        FilterSpec::literal(text)
    }
}

impl From<Regex> for FilterSpec {
    fn from(re: Regex) -> Self {
        FilterSpec::pattern(&re)
    }
}

impl From<&Regex> for FilterSpec {
    fn from(re: &Regex) -> Self {
        FilterSpec::pattern(re)
    }
}
