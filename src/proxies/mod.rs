//! # Task proxies.
//!
//! Every task the bus enqueues runs [`Worker`], which reads `bus_class_proxy` from
//! the payload and resolves it in the [`ProxyRegistry`]. Only registered names run;
//! anything else is logged and dropped.
//!
//! ## Contents
//! - [`Proxy`] / [`ProxyRef`] the task contract
//! - [`Driver`]         fans a published event out to matching subscriptions
//! - [`Rider`]          runs one subscription's handler
//! - [`Publisher`]      publishes a delayed event when it comes due
//! - [`HeartbeatProxy`] one heartbeat pass
//! - [`Worker`]         decode, resolve, run inside the middleware stack
//!
//! ## Flow
//! ```text
//! publish ─► bus_incoming [Worker{proxy=Driver}]
//!              └─► Driver ─► <app>_<queue> [Worker{proxy=Rider}] (one per match)
//!                              └─► Rider ─► Dispatchers::execute ─► handler
//! ```

mod driver;
mod heartbeat;
mod publisher;
mod rider;
mod worker;

pub use driver::Driver;
pub(crate) use driver::rider_payload;
pub use heartbeat::HeartbeatProxy;
pub use publisher::Publisher;
pub use rider::Rider;
pub use worker::{WorkOutcome, Worker};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::attributes::Attributes;
use crate::core::Bus;
use crate::error::BusError;

/// Class name of the worker that runs every bus task.
pub const WORKER: &str = "queuebus::Worker";
/// Proxy name of the fan-out step.
pub const DRIVER: &str = "queuebus::Driver";
/// Proxy name (and subscription class) of the execution step.
pub const RIDER: &str = "queuebus::Rider";
/// Proxy name of the delayed-publish step.
pub const PUBLISHER: &str = "queuebus::Publisher";
/// Proxy name of the heartbeat pass.
pub const HEARTBEAT: &str = "queuebus::Heartbeat";

/// A named step the worker can run.
#[async_trait]
pub trait Proxy: Send + Sync + 'static {
    /// Name stored in `bus_class_proxy`.
    fn name(&self) -> &str;

    /// Runs the step for one task.
    async fn perform(&self, bus: &Bus, attributes: Attributes) -> Result<(), BusError>;
}

/// Shared handle to a proxy.
pub type ProxyRef = Arc<dyn Proxy>;

/// Explicit name → proxy table consulted by the worker.
#[derive(Clone, Default)]
pub struct ProxyRegistry {
    proxies: HashMap<String, ProxyRef>,
}

impl ProxyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bus's own proxies.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(Driver));
        reg.register(Arc::new(Rider));
        reg.register(Arc::new(Publisher));
        reg.register(Arc::new(HeartbeatProxy));
        reg
    }

    /// Adds or replaces `proxy` under its name.
    pub fn register(&mut self, proxy: ProxyRef) {
        self.proxies.insert(proxy.name().to_string(), proxy);
    }

    /// Looks up a proxy by name.
    pub fn get(&self, name: &str) -> Option<ProxyRef> {
        self.proxies.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.proxies.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ProxyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_registered() {
        let reg = ProxyRegistry::with_defaults();
        assert_eq!(
            reg.names(),
            vec![DRIVER, HEARTBEAT, PUBLISHER, RIDER]
        );
        assert!(reg.get(WORKER).is_none());
        assert_eq!(reg.get(RIDER).map(|p| p.name().to_string()).as_deref(), Some(RIDER));
    }
}
