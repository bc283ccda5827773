//! Heartbeat pass as a task, so a scheduler can enqueue it on the incoming queue.

use async_trait::async_trait;

use super::{Proxy, HEARTBEAT};
use crate::attributes::Attributes;
use crate::core::Bus;
use crate::error::BusError;
use crate::heartbeat::Heartbeat;

/// Runs one [`Heartbeat::perform`].
#[derive(Clone, Copy, Debug, Default)]
pub struct HeartbeatProxy;

#[async_trait]
impl Proxy for HeartbeatProxy {
    fn name(&self) -> &str {
        HEARTBEAT
    }

    async fn perform(&self, bus: &Bus, _attributes: Attributes) -> Result<(), BusError> {
        Heartbeat::new(bus).perform().await.map(|_| ())
    }
}
