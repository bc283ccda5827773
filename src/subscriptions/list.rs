//! # Keyed set of subscriptions.
//!
//! [`SubscriptionList`] enforces unique keys: adding a key twice is a
//! [`BusError::DuplicateKey`], removing an unknown key is a [`BusError::MissingKey`].
//! Iteration order is by key.

use std::collections::BTreeMap;

use serde_json::Value;

use super::subscription::{StoredSubscription, Subscription};
use crate::attributes::Attributes;
use crate::error::BusError;

/// Subscriptions keyed by subscription key.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionList {
    subscriptions: BTreeMap<String, Subscription>,
}

impl SubscriptionList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `sub`; fails if its key is already present.
    pub fn add(&mut self, sub: Subscription) -> Result<&Subscription, BusError> {
        if self.subscriptions.contains_key(sub.key()) {
            return Err(BusError::DuplicateKey {
                key: sub.key().to_string(),
                queue: sub.queue_name().to_string(),
            });
        }
        let key = sub.key().to_string();
        Ok(self.subscriptions.entry(key).or_insert(sub))
    }

    /// Removes and returns the subscription stored under `key`.
    pub fn remove(&mut self, key: &str) -> Result<Subscription, BusError> {
        self.subscriptions
            .remove(key)
            .ok_or_else(|| BusError::MissingKey {
                key: key.to_string(),
            })
    }

    /// Looks up a subscription by key.
    pub fn key(&self, key: &str) -> Option<&Subscription> {
        self.subscriptions.get(key)
    }

    /// All subscriptions, ordered by key.
    pub fn all(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values()
    }

    /// Number of subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// True when the list holds nothing.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Subscriptions whose matcher accepts `attributes`.
    pub fn matches(&self, attributes: &Attributes) -> Vec<&Subscription> {
        self.all().filter(|sub| sub.matches(attributes)).collect()
    }

    /// Persisted form: key → record.
    pub fn to_wire(&self) -> BTreeMap<String, StoredSubscription> {
        self.subscriptions
            .iter()
            .map(|(key, sub)| (key.clone(), sub.to_wire()))
            .collect()
    }

    /// Rebuilds a list from decoded store values, skipping records that do not decode.
    ///
    /// Two records sharing a key are a [`BusError::DuplicateKey`].
    pub fn from_wire<'a, I>(table: I) -> Result<Self, BusError>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut out = Self::new();
        for sub in table.into_iter().filter_map(Subscription::from_wire) {
            out.add(sub)?;
        }
        Ok(out)
    }
}

impl<'a> IntoIterator for &'a SubscriptionList {
    type Item = &'a Subscription;
    type IntoIter = std::collections::btree_map::Values<'a, String, Subscription>;

    fn into_iter(self) -> Self::IntoIter {
        self.subscriptions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use serde_json::json;

    fn sub(key: &str, event: &str) -> Subscription {
        Subscription::new("app_default", key, "queuebus::Rider", Matcher::event_type(event))
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let mut list = SubscriptionList::new();
        list.add(sub("event_one", "event_one")).unwrap();
        let err = list.add(sub("event_one", "other")).unwrap_err();
        assert!(matches!(err, BusError::DuplicateKey { ref key, .. } if key == "event_one"));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_remove_missing_key_is_rejected() {
        let mut list = SubscriptionList::new();
        assert!(matches!(list.remove("nope"), Err(BusError::MissingKey { .. })));
        list.add(sub("a", "a")).unwrap();
        assert_eq!(list.remove("a").unwrap().key(), "a");
        assert!(list.is_empty());
    }

    #[test]
    fn test_matches_filters_by_event() {
        let mut list = SubscriptionList::new();
        list.add(sub("one", "event_one")).unwrap();
        list.add(sub("two", "event_two")).unwrap();
        let attrs = json!({"bus_event_type": "event_two"}).as_object().cloned().unwrap();
        let keys: Vec<_> = list.matches(&attrs).into_iter().map(|s| s.key()).collect();
        assert_eq!(keys, vec!["two"]);
    }

    #[test]
    fn test_from_wire_skips_legacy_entries() {
        let mut list = SubscriptionList::new();
        list.add(sub("one", "event_one")).unwrap();
        let mut values: Vec<Value> = list
            .to_wire()
            .values()
            .map(|s| serde_json::to_value(s).unwrap())
            .collect();
        values.push(json!("old format"));
        let back = SubscriptionList::from_wire(values.iter()).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.key("one").unwrap().matcher(), &Matcher::event_type("event_one"));
    }

    #[test]
    fn test_from_wire_rejects_duplicate_keys() {
        let record = serde_json::to_value(sub("dup", "x").to_wire()).unwrap();
        let err = SubscriptionList::from_wire([&record, &record]).unwrap_err();
        assert_eq!(err.as_label(), "bus_duplicate_key");
    }
}
