//! # Fan-out.
//!
//! [`Driver`] turns one published event into one rider task per matching
//! subscription, across every application registered in the store. Each task goes
//! to the subscription's own queue and carries the original attributes plus the
//! routing keys the rider needs.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Proxy, DRIVER};
use crate::attributes::{keys, stringify, Attributes};
use crate::core::Bus;
use crate::error::BusError;
use crate::registry::{Application, MatchedSubscription};

/// Routes a published event to matching subscriptions.
#[derive(Clone, Copy, Debug, Default)]
pub struct Driver;

impl Driver {
    /// Enqueues one task per matching subscription; returns how many were enqueued.
    pub async fn drive(bus: &Bus, attributes: &Attributes) -> Result<usize, BusError> {
        let event_type = stringify(attributes.get(keys::EVENT_TYPE));
        debug!(event_type = %event_type, "driver running");

        let driven_at = bus.now();
        let mut enqueued = 0;
        for app in Application::all(bus.store()).await? {
            for hit in app.subscription_matches(attributes).await? {
                let sub = &hit.subscription;
                let payload = rider_payload(attributes, &hit, driven_at);

                debug!(
                    event_type = %event_type,
                    app_key = %hit.app_key,
                    sub_key = sub.key(),
                    queue = sub.queue_name(),
                    "driving event"
                );
                bus.enqueue_to(sub.queue_name(), sub.class_name(), payload)
                    .await?;
                enqueued += 1;
            }
        }
        Ok(enqueued)
    }
}

/// `attributes` plus the routing keys a rider needs to find `hit` again.
pub(crate) fn rider_payload(
    attributes: &Attributes,
    hit: &MatchedSubscription,
    driven_at: i64,
) -> Attributes {
    let sub = &hit.subscription;
    let mut payload = attributes.clone();
    payload.insert(keys::DRIVEN_AT.into(), Value::from(driven_at));
    payload.insert(keys::RIDER_APP_KEY.into(), Value::from(hit.app_key.clone()));
    payload.insert(keys::RIDER_SUB_KEY.into(), Value::from(sub.key()));
    payload.insert(keys::RIDER_QUEUE.into(), Value::from(sub.queue_name()));
    payload.insert(keys::RIDER_CLASS_NAME.into(), Value::from(sub.class_name()));
    payload
}

#[async_trait]
impl Proxy for Driver {
    fn name(&self) -> &str {
        DRIVER
    }

    async fn perform(&self, bus: &Bus, attributes: Attributes) -> Result<(), BusError> {
        Driver::drive(bus, &attributes).await.map(|_| ())
    }
}
