//! Delayed publish: re-publishes `bus_event_type` with the stored attributes.

use async_trait::async_trait;
use tracing::debug;

use super::{Proxy, PUBLISHER};
use crate::attributes::{keys, stringify, Attributes};
use crate::core::Bus;
use crate::error::BusError;

/// Publishes an event that was scheduled with `publish_at`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Publisher;

#[async_trait]
impl Proxy for Publisher {
    fn name(&self) -> &str {
        PUBLISHER
    }

    async fn perform(&self, bus: &Bus, attributes: Attributes) -> Result<(), BusError> {
        let event_type = stringify(attributes.get(keys::EVENT_TYPE));
        debug!(event_type = %event_type, "publisher running");
        bus.publish(&event_type, attributes).await
    }
}
