//! # Key-value store contract.
//!
//! The bus persists subscription tables, the application index, the heartbeat
//! lock/marker and (through [`StoreQueue`](crate::queue::StoreQueue)) queued tasks
//! in a Redis-shaped key-value store. [`Store`] is the minimal surface it needs.
//!
//! ## Contents
//! - [`Store`]       async trait (strings, hashes, sets, sorted sets, lists, atomic rename)
//! - [`StoreRef`]    shared handle (`Arc<dyn Store>`)
//! - [`MemoryStore`] single-process implementation behind one mutex
//! - `RedisStore`    Redis implementation (feature `redis`)
//!
//! ## Rules
//! - Operations on a key holding another kind of value fail with [`StoreError::WrongType`].
//! - Collections that become empty are removed, like Redis does.
//! - `rename` is atomic: readers see either the old or the new value.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

/// Shared handle to a store.
pub type StoreRef = Arc<dyn Store>;

/// Redis-shaped key-value store.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Reads a string value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a string value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Writes a string value only if the key does not exist. Returns true if written.
    async fn setnx(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Writes a string value and returns the previous one.
    async fn getset(&self, key: &str, value: &str) -> Result<Option<String>, StoreError>;

    /// Deletes a key of any kind.
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Reads one hash field.
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Writes one hash field.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes one hash field.
    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError>;

    /// Reads a whole hash; missing key reads as empty.
    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, StoreError>;

    /// Reads several hashes in one round trip, in the order of `keys`.
    async fn hgetall_many(
        &self,
        keys: &[String],
    ) -> Result<Vec<BTreeMap<String, String>>, StoreError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.hgetall(key).await?);
        }
        Ok(out)
    }

    /// Adds a set member.
    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Removes a set member.
    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Lists set members (order unspecified).
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Adds or re-scores a sorted-set member.
    async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<(), StoreError>;

    /// Members with `min <= score <= max`, ascending by score.
    async fn zrangebyscore(&self, key: &str, min: i64, max: i64)
        -> Result<Vec<String>, StoreError>;

    /// Removes a sorted-set member.
    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Atomically moves `from` onto `to`, replacing it. Fails if `from` is missing.
    async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError>;

    /// Appends to a list.
    async fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Pops the head of a list.
    async fn lpop(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// List length; missing key reads as 0.
    async fn llen(&self, key: &str) -> Result<usize, StoreError>;
}
