//! # Queues kept in the key-value store.
//!
//! [`StoreQueue`] writes tasks in the list layout shared by Redis-backed job
//! runners, so an external worker pool can consume them; it also provides the
//! consumer side (`pop`, `promote_due`) for in-process workers and tests.
//!
//! ## Keys
//! - `queues`                  set of known queue names
//! - `queue:<name>`            list of [`Envelope`]s
//! - `delayed:<ts>`            list of delayed envelopes due at `ts`
//! - `delayed_queue_schedule`  sorted set of pending `ts` values (score = member = `ts`)

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Envelope, QueueBackend};
use crate::error::BusError;
use crate::store::StoreRef;

const QUEUES: &str = "queues";
const SCHEDULE: &str = "delayed_queue_schedule";

fn queue_key(name: &str) -> String {
    format!("queue:{name}")
}

fn delayed_key(ts: i64) -> String {
    format!("delayed:{ts}")
}

/// Queue backend over a [`Store`](crate::store::Store).
#[derive(Clone)]
pub struct StoreQueue {
    store: StoreRef,
}

impl StoreQueue {
    /// Creates a backend writing into `store`.
    pub fn new(store: StoreRef) -> Self {
        Self { store }
    }

    /// Pops the next task of `queue`.
    pub async fn pop(&self, queue: &str) -> Result<Option<Envelope>, BusError> {
        match self.store.lpop(&queue_key(queue)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Number of tasks waiting on `queue`.
    pub async fn len(&self, queue: &str) -> Result<usize, BusError> {
        Ok(self.store.llen(&queue_key(queue)).await?)
    }

    /// Names of every queue that has ever received a task.
    pub async fn queues(&self) -> Result<Vec<String>, BusError> {
        let mut names = self.store.smembers(QUEUES).await?;
        names.sort();
        Ok(names)
    }

    /// Timestamps still waiting in the delayed schedule, ascending.
    pub async fn scheduled(&self) -> Result<Vec<i64>, BusError> {
        let members = self.store.zrangebyscore(SCHEDULE, i64::MIN, i64::MAX).await?;
        Ok(members.iter().filter_map(|m| m.parse().ok()).collect())
    }

    /// Moves every delayed task due at or before `now` onto its queue.
    ///
    /// Returns the number of tasks moved.
    pub async fn promote_due(&self, now: i64) -> Result<usize, BusError> {
        let mut moved = 0;
        for member in self.store.zrangebyscore(SCHEDULE, i64::MIN, now).await? {
            let Ok(ts) = member.parse::<i64>() else {
                self.store.zrem(SCHEDULE, &member).await?;
                continue;
            };
            let key = delayed_key(ts);
            while let Some(raw) = self.store.lpop(&key).await? {
                let mut env: Envelope = serde_json::from_str(&raw)?;
                let Some(queue) = env.queue.take() else {
                    warn!(ts, class = %env.class, "delayed task without a queue; dropped");
                    continue;
                };
                self.push(&queue, &env).await?;
                moved += 1;
            }
            self.store.zrem(SCHEDULE, &member).await?;
        }
        if moved > 0 {
            debug!(moved, now, "promoted delayed tasks");
        }
        Ok(moved)
    }

    async fn push(&self, queue: &str, env: &Envelope) -> Result<(), BusError> {
        self.store.sadd(QUEUES, queue).await?;
        self.store
            .rpush(&queue_key(queue), &serde_json::to_string(env)?)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for StoreQueue {
    async fn enqueue(&self, queue: &str, class: &str, payload: String) -> Result<(), BusError> {
        self.push(queue, &Envelope::new(class, payload)).await
    }

    async fn enqueue_at(
        &self,
        epoch_seconds: i64,
        queue: &str,
        class: &str,
        payload: String,
    ) -> Result<(), BusError> {
        let env = Envelope::delayed(class, payload, queue);
        self.store
            .rpush(&delayed_key(epoch_seconds), &serde_json::to_string(&env)?)
            .await?;
        let ts = epoch_seconds.to_string();
        self.store.zadd(SCHEDULE, epoch_seconds, &ts).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_enqueue_writes_list_and_index() {
        let store = MemoryStore::arc();
        let q = StoreQueue::new(store.clone());
        q.enqueue("bus_incoming", "queuebus::Worker", "{\"a\":1}".into())
            .await
            .unwrap();

        assert_eq!(store.smembers("queues").await.unwrap(), vec!["bus_incoming"]);
        let raw = store.lpop("queue:bus_incoming").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"class": "queuebus::Worker", "args": ["{\"a\":1}"]})
        );
    }

    #[tokio::test]
    async fn test_enqueue_at_waits_until_promoted() {
        let store: Arc<MemoryStore> = MemoryStore::arc();
        let q = StoreQueue::new(store.clone());
        q.enqueue_at(1_000, "bus_incoming", "queuebus::Worker", "{}".into())
            .await
            .unwrap();

        assert_eq!(q.len("bus_incoming").await.unwrap(), 0);
        assert_eq!(q.scheduled().await.unwrap(), vec![1_000]);
        assert_eq!(store.llen("delayed:1000").await.unwrap(), 1);

        assert_eq!(q.promote_due(999).await.unwrap(), 0);
        assert_eq!(q.promote_due(1_000).await.unwrap(), 1);
        assert!(q.scheduled().await.unwrap().is_empty());

        let env = q.pop("bus_incoming").await.unwrap().unwrap();
        assert_eq!(env.class, "queuebus::Worker");
        assert_eq!(env.queue, None);
        assert_eq!(env.payload(), Some("{}"));
    }

    #[tokio::test]
    async fn test_promote_due_drops_delayed_task_without_queue() {
        let store: Arc<MemoryStore> = MemoryStore::arc();
        let q = StoreQueue::new(store.clone());
        let orphan = Envelope::new("queuebus::Worker", "{}".into());
        store
            .rpush("delayed:500", &serde_json::to_string(&orphan).unwrap())
            .await
            .unwrap();
        store.zadd("delayed_queue_schedule", 500, "500").await.unwrap();
        q.enqueue_at(500, "bus_incoming", "queuebus::Worker", "{\"a\":1}".into())
            .await
            .unwrap();

        assert_eq!(q.promote_due(500).await.unwrap(), 1);
        assert_eq!(store.llen("delayed:500").await.unwrap(), 0);
        assert!(q.scheduled().await.unwrap().is_empty());
        let env = q.pop("bus_incoming").await.unwrap().unwrap();
        assert_eq!(env.payload(), Some("{\"a\":1}"));
        assert_eq!(q.queues().await.unwrap(), vec!["bus_incoming"]);
    }
}
