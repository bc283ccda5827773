//! # Persisted per-namespace subscription table.
//!
//! An [`Application`] is one namespace (app key) and the subscriptions it has
//! published to the store. The driver reads every application to route events;
//! deploy tooling writes them.
//!
//! ## Keys
//! ```text
//! bus_apps                        set of app keys
//! bus_app:<app_key>               hash: subscription key → StoredSubscription JSON
//! temp_bus_app:<app_key>:<rand>   staging hash, renamed onto bus_app:<app_key>
//! ```
//!
//! ## Rules
//! - `subscribe` replaces the whole table atomically (stage, then rename).
//! - An empty list unsubscribes the namespace entirely.
//! - Values that are not valid JSON are kept verbatim and ignored when routing.

use std::collections::BTreeMap;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, info};

use super::MatchedSubscription;
use crate::attributes::Attributes;
use crate::error::BusError;
use crate::store::StoreRef;
use crate::subscriptions::{Subscription, SubscriptionList};

/// Set indexing every registered app key.
pub const APP_LIST_KEY: &str = "bus_apps";
/// Prefix of each per-application hash.
pub const APP_SINGLE_KEY: &str = "bus_app";

/// Normalizes an application name; fails when nothing but `_` remains.
///
/// # Example
/// ```
/// use queuebus::registry::normalize_app_key;
///
/// assert_eq!(normalize_app_key("My App").unwrap(), "my_app");
/// assert!(normalize_app_key("/ /").is_err());
/// ```
pub fn normalize_app_key(name: &str) -> Result<String, BusError> {
    let key = Subscription::normalize(name);
    if key.chars().all(|c| c == '_') {
        return Err(BusError::InvalidAppKey {
            name: name.to_string(),
        });
    }
    Ok(key)
}

/// One namespace's persisted subscription table.
#[derive(Clone)]
pub struct Application {
    app_key: String,
    store_key: String,
    store: StoreRef,
    raw: Option<BTreeMap<String, String>>,
}

impl Application {
    /// Opens the namespace `app_key` (normalized) in `store`.
    pub fn new(app_key: &str, store: StoreRef) -> Result<Self, BusError> {
        let app_key = normalize_app_key(app_key)?;
        let store_key = format!("{APP_SINGLE_KEY}:{app_key}");
        Ok(Self {
            app_key,
            store_key,
            store,
            raw: None,
        })
    }

    /// Every registered application, tables loaded in one batched read.
    pub async fn all(store: &StoreRef) -> Result<Vec<Application>, BusError> {
        let mut keys = store.smembers(APP_LIST_KEY).await?;
        keys.sort();
        let mut apps = Vec::with_capacity(keys.len());
        for key in &keys {
            match Application::new(key, store.clone()) {
                Ok(app) => apps.push(app),
                Err(e) => debug!(app_key = %key, error = %e, "skipping unusable app key"),
            }
        }
        let store_keys: Vec<String> = apps.iter().map(|a| a.store_key.clone()).collect();
        let tables = store.hgetall_many(&store_keys).await?;
        for (app, table) in apps.iter_mut().zip(tables) {
            app.raw = Some(table);
        }
        Ok(apps)
    }

    /// Normalized app key.
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// Store key of the table (`bus_app:<app_key>`).
    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    /// Replaces the persisted table with `list`; an empty list unsubscribes.
    pub async fn subscribe(&mut self, list: &SubscriptionList) -> Result<(), BusError> {
        self.raw = None;
        if list.is_empty() {
            return self.unsubscribe().await;
        }

        let temp_key = format!(
            "temp_{}:{}",
            self.store_key,
            rand::thread_rng().gen_range(0..999_999_999u32)
        );
        for (key, stored) in list.to_wire() {
            let json = serde_json::to_string(&stored)?;
            self.store.hset(&temp_key, &key, &json).await?;
        }
        self.store.rename(&temp_key, &self.store_key).await?;
        self.store.sadd(APP_LIST_KEY, &self.app_key).await?;

        info!(app_key = %self.app_key, subscriptions = list.len(), "subscribed application");
        Ok(())
    }

    /// Removes the table and its index entry.
    pub async fn unsubscribe(&mut self) -> Result<(), BusError> {
        self.raw = None;
        self.store.srem(APP_LIST_KEY, &self.app_key).await?;
        self.store.del(&self.store_key).await?;
        info!(app_key = %self.app_key, "unsubscribed application");
        Ok(())
    }

    /// Removes only the entries whose stored `queue_name` equals `queue`.
    ///
    /// The index entry is kept even if the table becomes empty.
    pub async fn unsubscribe_queue(&mut self, queue: &str) -> Result<usize, BusError> {
        let table = self.read_table().await?;
        let mut removed = 0;
        for (key, value) in &table {
            let stored_queue = value.get("queue_name").and_then(Value::as_str);
            if stored_queue == Some(queue) {
                self.store.hdel(&self.store_key, key).await?;
                removed += 1;
            }
        }
        self.raw = None;
        info!(app_key = %self.app_key, queue, removed, "unsubscribed queue");
        Ok(removed)
    }

    /// The stored table, decoded; values that are not JSON come back as strings.
    pub async fn read_table(&self) -> Result<BTreeMap<String, Value>, BusError> {
        let raw = self.raw_table().await?;
        Ok(raw
            .into_iter()
            .map(|(key, text)| {
                let value =
                    serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text));
                (key, value)
            })
            .collect())
    }

    /// Subscriptions rebuilt from the stored table (no handlers attached).
    pub async fn subscriptions(&self) -> Result<SubscriptionList, BusError> {
        let table = self.read_table().await?;
        SubscriptionList::from_wire(table.values())
    }

    /// Stored subscriptions accepting `attributes`, tagged with this app key.
    pub async fn subscription_matches(
        &self,
        attributes: &Attributes,
    ) -> Result<Vec<MatchedSubscription>, BusError> {
        let list = self.subscriptions().await?;
        Ok(list
            .matches(attributes)
            .into_iter()
            .map(|sub| MatchedSubscription::new(&self.app_key, sub.clone()))
            .collect())
    }

    /// Queue names a worker pool for `list` should listen on, without touching the store.
    ///
    /// One `<app_key>_<queue>` per subscription plus `<app_key>_default`, deduplicated.
    pub fn queue_names(&self, list: &SubscriptionList) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(list.len() + 1);
        let names = list
            .all()
            .map(|sub| format!("{}_{}", self.app_key, sub.queue_name()))
            .chain(std::iter::once(format!("{}_default", self.app_key)));
        for name in names {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    /// `(class, queue, matcher)` for every stored subscription, for operator display.
    pub async fn display_tuples(
        &self,
    ) -> Result<Vec<(String, String, BTreeMap<String, String>)>, BusError> {
        let list = self.subscriptions().await?;
        Ok(list
            .all()
            .map(|sub| {
                (
                    sub.class_name().to_string(),
                    sub.queue_name().to_string(),
                    sub.matcher().to_wire(),
                )
            })
            .collect())
    }

    async fn raw_table(&self) -> Result<BTreeMap<String, String>, BusError> {
        match &self.raw {
            Some(raw) => Ok(raw.clone()),
            None => Ok(self.store.hgetall(&self.store_key).await?),
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("app_key", &self.app_key)
            .field("store_key", &self.store_key)
            .field("loaded", &self.raw.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use crate::store::{MemoryStore, Store};
    use serde_json::json;
    use std::sync::Arc;

    fn list(entries: &[(&str, &str, &str)]) -> SubscriptionList {
        let mut l = SubscriptionList::new();
        for (queue, key, event) in entries {
            l.add(Subscription::new(queue, *key, "queuebus::Rider", Matcher::event_type(*event)))
                .unwrap();
        }
        l
    }

    fn attrs(v: Value) -> Attributes {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_invalid_names() {
        assert!(normalize_app_key("").is_err());
        assert!(normalize_app_key("__").is_err());
        assert!(normalize_app_key("-.-").is_err());
        assert_eq!(normalize_app_key("Test-App").unwrap(), "test_app");
    }

    #[tokio::test]
    async fn test_subscribe_writes_table_and_index() {
        let mem = MemoryStore::arc();
        let store: StoreRef = mem.clone();
        let mut app = Application::new("test", store.clone()).unwrap();
        app.subscribe(&list(&[("test_default", "event_one", "event_one")]))
            .await
            .unwrap();

        assert_eq!(store.smembers("bus_apps").await.unwrap(), vec!["test"]);
        let raw = store.hget("bus_app:test", "event_one").await.unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            json!({
                "queue_name": "test_default",
                "key": "event_one",
                "class": "queuebus::Rider",
                "matcher": {"bus_event_type": "event_one"}
            })
        );
        assert!(mem.keys().await.iter().all(|k| !k.starts_with("temp_")));
    }

    #[tokio::test]
    async fn test_subscribe_replaces_previous_table() {
        let store: StoreRef = MemoryStore::arc();
        let mut app = Application::new("test", store.clone()).unwrap();
        app.subscribe(&list(&[("q", "a", "a"), ("q", "b", "b")])).await.unwrap();
        app.subscribe(&list(&[("q", "c", "c")])).await.unwrap();
        let keys: Vec<String> = store.hgetall("bus_app:test").await.unwrap().into_keys().collect();
        assert_eq!(keys, vec!["c"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_never_see_partial_table() {
        let store: StoreRef = MemoryStore::arc();
        let first = list(&[("q", "a", "a"), ("q", "b", "b"), ("q", "c", "c")]);
        let second = list(&[("q", "d", "d"), ("q", "e", "e"), ("q", "f", "f")]);

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut app = Application::new("test", store).unwrap();
                for i in 0..200 {
                    let next = if i % 2 == 0 { &first } else { &second };
                    app.subscribe(next).await.unwrap();
                }
            })
        };

        let complete = [vec!["a", "b", "c"], vec!["d", "e", "f"]];
        while !writer.is_finished() {
            let keys: Vec<String> = store
                .hgetall("bus_app:test")
                .await
                .unwrap()
                .into_keys()
                .collect();
            assert!(
                keys.is_empty() || complete.iter().any(|c| *c == keys),
                "partial table observed: {keys:?}"
            );
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        let keys: Vec<String> = store.hgetall("bus_app:test").await.unwrap().into_keys().collect();
        assert_eq!(keys, vec!["d", "e", "f"]);
    }

    #[tokio::test]
    async fn test_empty_subscribe_unsubscribes() {
        let store: StoreRef = MemoryStore::arc();
        let mut app = Application::new("test", store.clone()).unwrap();
        app.subscribe(&list(&[("q", "a", "a")])).await.unwrap();
        app.subscribe(&SubscriptionList::new()).await.unwrap();
        assert!(store.smembers("bus_apps").await.unwrap().is_empty());
        assert!(store.hgetall("bus_app:test").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_queue_keeps_others() {
        let store: StoreRef = MemoryStore::arc();
        let mut app = Application::new("myapp", store.clone()).unwrap();
        app.subscribe(&list(&[
            ("myapp_default", "one", "one"),
            ("myapp_other", "two", "two"),
        ]))
        .await
        .unwrap();

        assert_eq!(app.unsubscribe_queue("myapp_default").await.unwrap(), 1);
        let subs = app.subscriptions().await.unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs.key("two").is_some());
        assert_eq!(store.smembers("bus_apps").await.unwrap(), vec!["myapp"]);
    }

    #[tokio::test]
    async fn test_all_and_matches() {
        let store: StoreRef = MemoryStore::arc();
        Application::new("app1", store.clone())
            .unwrap()
            .subscribe(&list(&[("app1_default", "event_one", "event_one")]))
            .await
            .unwrap();
        Application::new("app2", store.clone())
            .unwrap()
            .subscribe(&list(&[("app2_default", "event_two", "event_two")]))
            .await
            .unwrap();

        let apps = Application::all(&store).await.unwrap();
        let keys: Vec<&str> = apps.iter().map(Application::app_key).collect();
        assert_eq!(keys, vec!["app1", "app2"]);

        let event = attrs(json!({"bus_event_type": "event_two"}));
        let matches = apps[1].subscription_matches(&event).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].app_key, "app2");
        assert_eq!(matches[0].subscription.key(), "event_two");
        assert!(apps[0].subscription_matches(&event).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_values_are_skipped() {
        let store: StoreRef = MemoryStore::arc();
        store.sadd("bus_apps", "old").await.unwrap();
        store.hset("bus_app:old", "legacy", "not json").await.unwrap();
        let app = Application::new("old", store.clone()).unwrap();
        let table = app.read_table().await.unwrap();
        assert_eq!(table.get("legacy"), Some(&json!("not json")));
        assert!(app.subscriptions().await.unwrap().is_empty());
    }

    #[test]
    fn test_queue_names_adds_default() {
        let app = Application::new("app", Arc::new(MemoryStore::new())).unwrap();
        let names = app.queue_names(&list(&[("default", "a", "a"), ("more", "b", "b"), ("more", "c", "c")]));
        assert_eq!(names, vec!["app_default", "app_more"]);
    }

    #[tokio::test]
    async fn test_display_tuples() {
        let store: StoreRef = MemoryStore::arc();
        let mut app = Application::new("app", store).unwrap();
        app.subscribe(&list(&[("app_default", "a", "event_a")])).await.unwrap();
        let tuples = app.display_tuples().await.unwrap();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].0, "queuebus::Rider");
        assert_eq!(tuples[0].1, "app_default");
        assert_eq!(tuples[0].2.get("bus_event_type").map(String::as_str), Some("event_a"));
    }
}
