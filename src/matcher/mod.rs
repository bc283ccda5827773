//! Attribute filters.
//!
//! A [`Matcher`] maps attribute names to [`FilterSpec`]s and accepts an event only
//! when **every** entry accepts it. An empty matcher accepts nothing.
//!
//! ## Contents
//! - [`Special`]    presence/emptiness tokens (`key`, `value`, `present`, `blank`, `empty`, `nil`)
//! - [`FilterSpec`] one entry: a special token, a literal or a pattern
//! - [`Matcher`]    the AND of all entries, plus its persisted string form
//!
//! ## Wire form
//! ```text
//! Special::Blank            → "bus_special_value_blank"
//! literal "cat"             → "cat"            (equality, then regex ^cat$)
//! pattern  /^[cb]a+t/       → "(?-mix:^[cb]a+t)" (regex as written, unanchored)
//! ```

mod filter;
mod special;

pub use filter::FilterSpec;
pub use special::Special;

use std::collections::BTreeMap;

use crate::attributes::Attributes;

/// Conjunction of per-attribute filters.
#[derive(Clone, Debug, Default)]
pub struct Matcher {
    filters: BTreeMap<String, FilterSpec>,
}

impl Matcher {
    /// Creates an empty matcher (matches nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// Matcher on `bus_event_type` only.
    pub fn event_type(event_type: impl Into<String>) -> Self {
        Self::new().with(crate::attributes::keys::EVENT_TYPE, event_type.into())
    }

    /// Adds (or replaces) the filter for `name`.
    pub fn with(mut self, name: impl Into<String>, spec: impl Into<FilterSpec>) -> Self {
        self.insert(name, spec);
        self
    }

    /// Adds (or replaces) the filter for `name` in place.
    pub fn insert(&mut self, name: impl Into<String>, spec: impl Into<FilterSpec>) {
        self.filters.insert(name.into(), spec.into());
    }

    /// Returns the filter for `name`.
    pub fn get(&self, name: &str) -> Option<&FilterSpec> {
        self.filters.get(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Evaluates the single filter registered for `name`.
    ///
    /// Returns false when no filter exists for `name` or its spec is empty.
    pub fn match_attribute(&self, name: &str, attributes: &Attributes) -> bool {
        match self.filters.get(name) {
            Some(spec) => spec.accepts(name, attributes),
            None => false,
        }
    }

    /// True when the matcher is non-empty, `attributes` is given, and every entry accepts.
    ///
    /// # Example
    /// ```
    /// use queuebus::{Matcher, Special};
    /// use serde_json::json;
    ///
    /// let m = Matcher::new().with("state", "sleeping").with("name", Special::Present);
    /// let attrs = json!({"state": "sleeping", "name": "cat"});
    /// assert!(m.matches(attrs.as_object()));
    /// assert!(!m.matches(None));
    /// ```
    pub fn matches(&self, attributes: Option<&Attributes>) -> bool {
        let Some(attributes) = attributes else {
            return false;
        };
        if self.filters.is_empty() {
            return false;
        }
        self.filters
            .iter()
            .all(|(name, spec)| spec.accepts(name, attributes))
    }

    /// Persisted form: attribute name → encoded spec.
    pub fn to_wire(&self) -> BTreeMap<String, String> {
        self.filters
            .iter()
            .map(|(name, spec)| (name.clone(), spec.to_wire()))
            .collect()
    }

    /// Rebuilds a matcher from its persisted form.
    pub fn from_wire<I, K, V>(wire: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let filters = wire
            .into_iter()
            .map(|(name, raw)| (name.into(), FilterSpec::from_wire(raw.as_ref())))
            .collect();
        Self { filters }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.to_wire() == other.to_wire()
    }
}

impl Eq for Matcher {}

impl<K, V> FromIterator<(K, V)> for Matcher
where
    K: Into<String>,
    V: Into<FilterSpec>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut m = Matcher::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use serde_json::{json, Value};

    fn attrs(v: Value) -> Attributes {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_empty_matcher_matches_nothing() {
        let m = Matcher::new();
        assert!(!m.matches(Some(&attrs(json!({})))));
        assert!(!m.matches(None));
        assert!(!m.matches(Some(&attrs(json!({"name": "val"})))));
    }

    #[test]
    fn test_absent_attributes_never_match() {
        let m = Matcher::new().with("name", "val");
        assert!(!m.matches(None));
    }

    #[test]
    fn test_literal_is_exact() {
        let m = Matcher::new().with("name", "val");
        assert!(m.matches(Some(&attrs(json!({"name": "val"})))));
        assert!(!m.matches(Some(&attrs(json!({"name": " val"})))));
        assert!(!m.matches(Some(&attrs(json!({"name": "zval"})))));
    }

    #[test]
    fn test_pattern_is_unanchored_at_end() {
        let re = Regex::new("^[cb]a+t").unwrap();
        let m = Matcher::new().with("name", re);
        assert!(m.matches(Some(&attrs(json!({"name": "cat"})))));
        assert!(m.matches(Some(&attrs(json!({"name": "bat"})))));
        assert!(m.matches(Some(&attrs(json!({"name": "caaaaat"})))));
        assert!(m.matches(Some(&attrs(json!({"name": "cats"})))));
        assert!(!m.matches(Some(&attrs(json!({"name": "ct"})))));
        assert!(!m.matches(Some(&attrs(json!({"name": "bcat"})))));
    }

    #[test]
    fn test_multiple_filters_are_and() {
        let m = Matcher::new()
            .with("name", Regex::new("^[cb]a+t").unwrap())
            .with("state", "sleeping");
        assert!(m.matches(Some(&attrs(json!({"state": "sleeping", "name": "cat"})))));
        assert!(!m.matches(Some(&attrs(json!({"state": "awake", "name": "cat"})))));
        assert!(m.matches(Some(&attrs(json!({"state": "sleeping", "name": "bat"})))));
        assert!(!m.matches(Some(&attrs(json!({"state": "sleeping", "name": "bear"})))));
        assert!(!m.matches(Some(&attrs(json!({"state": "awake", "name": "bear"})))));
    }

    #[test]
    fn test_pattern_survives_wire_twice() {
        let m = Matcher::new().with("name", Regex::new("^[cb]a+t").unwrap());
        let once = Matcher::from_wire(m.to_wire());
        let twice = Matcher::from_wire(once.to_wire());
        assert_eq!(
            twice.to_wire().get("name").map(String::as_str),
            Some("(?-mix:^[cb]a+t)")
        );
        for (name, expected) in [("cat", true), ("caaaaat", true), ("ct", false), ("bcat", false)] {
            assert_eq!(twice.matches(Some(&attrs(json!({ "name": name })))), expected, "{name}");
        }
        assert_eq!(m, twice);
    }

    #[test]
    fn test_special_survives_wire() {
        let m = Matcher::new().with("name", Special::Blank);
        let wire = m.to_wire();
        assert_eq!(
            wire.get("name").map(String::as_str),
            Some("bus_special_value_blank")
        );
        let back = Matcher::from_wire(wire);
        assert!(!back.matches(Some(&attrs(json!({"name": "cat"})))));
        assert!(back.matches(Some(&attrs(json!({"name": ""})))));
    }

    #[test]
    fn test_numbers_compare_stringified() {
        let m = Matcher::new().with("minute", "5");
        assert!(m.matches(Some(&attrs(json!({"minute": 5})))));
        assert!(!m.matches(Some(&attrs(json!({"minute": 15})))));
    }

    #[test]
    fn test_match_attribute_without_filter_is_false() {
        let m = Matcher::new().with("name", "x");
        assert!(!m.match_attribute("other", &attrs(json!({"other": "x"}))));
        assert!(m.match_attribute("name", &attrs(json!({"name": "x"}))));
    }

    #[test]
    fn test_from_iterator_collects_specs() {
        let m: Matcher = [("a", FilterSpec::from("1")), ("b", FilterSpec::from(Special::Nil))]
            .into_iter()
            .collect();
        assert_eq!(m.len(), 2);
        assert!(m.matches(Some(&attrs(json!({"a": "1"})))));
    }
}
