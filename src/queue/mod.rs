//! # Work-queue contract.
//!
//! The bus only needs two things from a queue system: put a task on a named queue
//! now, and put it there at a given time. Every task the bus creates runs the
//! worker proxy; the real destination (`Driver`, `Rider`, `Publisher`, ...) travels
//! inside the payload under `bus_class_proxy`.
//!
//! ```text
//! queue:<name>  ← {"class":"queuebus::Worker","args":["<payload json>"]}
//! delayed:<ts>  ← {"class":"queuebus::Worker","args":["<payload json>"],"queue":"<name>"}
//! ```
//!
//! ## Contents
//! - [`QueueBackend`] / [`QueueRef`] the contract
//! - [`Envelope`]     the stored task shape
//! - [`StoreQueue`]   a backend that keeps queues in the key-value store

mod store_queue;

pub use store_queue::StoreQueue;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BusError;

/// Shared handle to a queue backend.
pub type QueueRef = Arc<dyn QueueBackend>;

/// Minimal queue system used by the bus.
#[async_trait]
pub trait QueueBackend: Send + Sync + 'static {
    /// Enqueues `class` with the JSON `payload` on `queue`, to run as soon as possible.
    async fn enqueue(&self, queue: &str, class: &str, payload: String) -> Result<(), BusError>;

    /// Enqueues `class` with the JSON `payload` on `queue`, to run at `epoch_seconds`.
    async fn enqueue_at(
        &self,
        epoch_seconds: i64,
        queue: &str,
        class: &str,
        payload: String,
    ) -> Result<(), BusError>;
}

/// Task as stored on a queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Class the consumer runs.
    pub class: String,
    /// Arguments; the bus always sends exactly one JSON-encoded attribute map.
    pub args: Vec<String>,
    /// Destination queue, only set while the task waits in the delayed schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

impl Envelope {
    /// Immediate task.
    pub fn new(class: impl Into<String>, payload: String) -> Self {
        Self {
            class: class.into(),
            args: vec![payload],
            queue: None,
        }
    }

    /// Delayed task remembering its destination queue.
    pub fn delayed(class: impl Into<String>, payload: String, queue: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            args: vec![payload],
            queue: Some(queue.into()),
        }
    }

    /// The JSON payload handed to the worker.
    pub fn payload(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}
