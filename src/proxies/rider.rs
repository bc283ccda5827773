//! # Execution.
//!
//! [`Rider`] runs in the subscribing application's worker: it reads the routing
//! keys stamped by the driver and hands the task to
//! [`Dispatchers::execute`](crate::dispatch::Dispatchers::execute).

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Proxy, RIDER};
use crate::attributes::{keys, non_empty, Attributes};
use crate::core::Bus;
use crate::dispatch::ExecuteOutcome;
use crate::error::BusError;

/// Runs the subscription a task was routed to.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rider;

impl Rider {
    /// Executes the task; fails with [`BusError::MissingRiderKey`] without routing keys.
    pub async fn ride(bus: &Bus, mut attributes: Attributes) -> Result<ExecuteOutcome, BusError> {
        let app_key = non_empty(&attributes, keys::RIDER_APP_KEY).ok_or(
            BusError::MissingRiderKey {
                field: keys::RIDER_APP_KEY,
            },
        )?;
        let sub_key = non_empty(&attributes, keys::RIDER_SUB_KEY).ok_or(
            BusError::MissingRiderKey {
                field: keys::RIDER_SUB_KEY,
            },
        )?;

        debug!(app_key = %app_key, sub_key = %sub_key, "rider received");
        attributes.insert(keys::EXECUTED_AT.into(), Value::from(bus.now()));
        bus.dispatchers()
            .execute(&app_key, &sub_key, attributes)
            .await
    }
}

#[async_trait]
impl Proxy for Rider {
    fn name(&self) -> &str {
        RIDER
    }

    async fn perform(&self, bus: &Bus, attributes: Attributes) -> Result<(), BusError> {
        Rider::ride(bus, attributes).await.map(|_| ())
    }
}
