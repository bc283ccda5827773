//! In-memory implementation of the key-value store for tests, demos and
//! single-process deployments.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::Store;
use crate::error::StoreError;

#[derive(Clone, Debug)]
enum Entry {
    Str(String),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
    ZSet(BTreeMap<String, i64>),
    List(VecDeque<String>),
}

/// In-memory key-value store.
///
/// Cloning shares the underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store and returns it as a shared handle.
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// All keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let map = self.map.lock().await;
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Removes every key.
    pub async fn flush(&self) {
        self.map.lock().await.clear();
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

macro_rules! entry_mut {
    ($map:expr, $key:expr, $variant:ident, $empty:expr) => {
        match $map
            .entry($key.to_string())
            .or_insert_with(|| Entry::$variant($empty))
        {
            Entry::$variant(inner) => inner,
            _ => return Err(wrong_type($key)),
        }
    };
}

macro_rules! entry_ref {
    ($map:expr, $key:expr, $variant:ident) => {
        match $map.get($key) {
            None => None,
            Some(Entry::$variant(inner)) => Some(inner),
            Some(_) => return Err(wrong_type($key)),
        }
    };
}

fn drop_if_empty(map: &mut HashMap<String, Entry>, key: &str) {
    let empty = match map.get(key) {
        Some(Entry::Hash(h)) => h.is_empty(),
        Some(Entry::Set(s)) => s.is_empty(),
        Some(Entry::ZSet(z)) => z.is_empty(),
        Some(Entry::List(l)) => l.is_empty(),
        _ => false,
    };
    if empty {
        map.remove(key);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.map.lock().await;
        Ok(entry_ref!(map, key, Str).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        map.insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(())
    }

    async fn setnx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut map = self.map.lock().await;
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(true)
    }

    async fn getset(&self, key: &str, value: &str) -> Result<Option<String>, StoreError> {
        let mut map = self.map.lock().await;
        let prior = entry_ref!(map, key, Str).cloned();
        map.insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(prior)
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.map.lock().await.remove(key);
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let map = self.map.lock().await;
        Ok(entry_ref!(map, key, Hash).and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        entry_mut!(map, key, Hash, BTreeMap::new()).insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        if let Some(Entry::Hash(h)) = map.get_mut(key) {
            h.remove(field);
        } else if map.contains_key(key) {
            return Err(wrong_type(key));
        }
        drop_if_empty(&mut map, key);
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let map = self.map.lock().await;
        Ok(entry_ref!(map, key, Hash).cloned().unwrap_or_default())
    }

    async fn hgetall_many(
        &self,
        keys: &[String],
    ) -> Result<Vec<BTreeMap<String, String>>, StoreError> {
        let map = self.map.lock().await;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(entry_ref!(map, key.as_str(), Hash).cloned().unwrap_or_default());
        }
        Ok(out)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        entry_mut!(map, key, Set, BTreeSet::new()).insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        if let Some(Entry::Set(s)) = map.get_mut(key) {
            s.remove(member);
        } else if map.contains_key(key) {
            return Err(wrong_type(key));
        }
        drop_if_empty(&mut map, key);
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let map = self.map.lock().await;
        Ok(entry_ref!(map, key, Set)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        entry_mut!(map, key, ZSet, BTreeMap::new()).insert(member.to_string(), score);
        Ok(())
    }

    async fn zrangebyscore(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<String>, StoreError> {
        let map = self.map.lock().await;
        let Some(z) = entry_ref!(map, key, ZSet) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<(i64, &String)> = z
            .iter()
            .filter(|(_, &score)| score >= min && score <= max)
            .map(|(member, &score)| (score, member))
            .collect();
        hits.sort();
        Ok(hits.into_iter().map(|(_, m)| m.clone()).collect())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        if let Some(Entry::ZSet(z)) = map.get_mut(key) {
            z.remove(member);
        } else if map.contains_key(key) {
            return Err(wrong_type(key));
        }
        drop_if_empty(&mut map, key);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        let entry = map.remove(from).ok_or_else(|| StoreError::NoSuchKey {
            key: from.to_string(),
        })?;
        map.insert(to.to_string(), entry);
        Ok(())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        entry_mut!(map, key, List, VecDeque::new()).push_back(value.to_string());
        Ok(())
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut map = self.map.lock().await;
        let head = match map.get_mut(key) {
            None => None,
            Some(Entry::List(l)) => l.pop_front(),
            Some(_) => return Err(wrong_type(key)),
        };
        drop_if_empty(&mut map, key);
        Ok(head)
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let map = self.map.lock().await;
        Ok(entry_ref!(map, key, List).map_or(0, VecDeque::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setnx_and_getset() {
        let store = MemoryStore::new();
        assert!(store.setnx("lock", "10").await.unwrap());
        assert!(!store.setnx("lock", "20").await.unwrap());
        assert_eq!(store.getset("lock", "30").await.unwrap().as_deref(), Some("10"));
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("30"));
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(
            store.hset("k", "f", "v").await,
            Err(StoreError::WrongType { key: "k".into() })
        );
        assert!(store.lpop("k").await.is_err());
    }

    #[tokio::test]
    async fn test_rename_replaces_target() {
        let store = MemoryStore::new();
        store.hset("old", "a", "1").await.unwrap();
        store.hset("new", "b", "2").await.unwrap();
        store.rename("old", "new").await.unwrap();
        let all = store.hgetall("new").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("a").map(String::as_str), Some("1"));
        assert!(store.hgetall("old").await.unwrap().is_empty());
        assert_eq!(
            store.rename("missing", "x").await,
            Err(StoreError::NoSuchKey { key: "missing".into() })
        );
    }

    #[tokio::test]
    async fn test_empty_collections_disappear() {
        let store = MemoryStore::new();
        store.sadd("s", "a").await.unwrap();
        store.srem("s", "a").await.unwrap();
        store.rpush("l", "x").await.unwrap();
        store.lpop("l").await.unwrap();
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_zrangebyscore_orders_by_score() {
        let store = MemoryStore::new();
        store.zadd("z", 30, "c").await.unwrap();
        store.zadd("z", 10, "a").await.unwrap();
        store.zadd("z", 20, "b").await.unwrap();
        assert_eq!(store.zrangebyscore("z", 0, 20).await.unwrap(), vec!["a", "b"]);
        store.zrem("z", "a").await.unwrap();
        assert_eq!(store.zrangebyscore("z", 0, 100).await.unwrap(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_hgetall_many_keeps_order() {
        let store = MemoryStore::new();
        store.hset("h1", "a", "1").await.unwrap();
        store.hset("h2", "b", "2").await.unwrap();
        let all = store
            .hgetall_many(&["h2".into(), "missing".into(), "h1".into()])
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].contains_key("b"));
        assert!(all[1].is_empty());
        assert!(all[2].contains_key("a"));
    }
}
