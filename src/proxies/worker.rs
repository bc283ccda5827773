//! # Worker entry point.
//!
//! [`Worker::perform`] is what a queue consumer calls with the payload of a
//! `queuebus::Worker` task. It decodes the attributes, resolves `bus_class_proxy`
//! in the bus's [`ProxyRegistry`](super::ProxyRegistry) and runs the proxy inside
//! the middleware stack.
//!
//! ## Rules
//! - Unknown or missing proxy names are logged at `warn` and reported as
//!   [`WorkOutcome::UnknownProxy`]; the task is consumed, not retried.
//! - Errors from the proxy (including handler errors) propagate unchanged.

use tracing::{debug, warn};

use crate::attributes::{keys, stringify, Attributes};
use crate::core::Bus;
use crate::error::BusError;
use crate::queue::Envelope;

/// What the worker did with a task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkOutcome {
    /// The proxy ran and returned `Ok`.
    Performed {
        /// Proxy that ran.
        proxy: String,
    },
    /// `bus_class_proxy` named nothing registered.
    UnknownProxy {
        /// The name from the payload (empty if absent).
        name: String,
    },
}

impl WorkOutcome {
    /// Returns a short stable label for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkOutcome::Performed { .. } => "performed",
            WorkOutcome::UnknownProxy { .. } => "unknown_proxy",
        }
    }
}

/// Runs bus tasks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Worker;

impl Worker {
    /// Runs a task given its JSON payload.
    pub async fn perform(bus: &Bus, payload: &str) -> Result<WorkOutcome, BusError> {
        let attributes: Attributes = serde_json::from_str(payload)?;
        Self::perform_attributes(bus, attributes).await
    }

    /// Runs a task popped from a queue.
    pub async fn perform_envelope(bus: &Bus, envelope: &Envelope) -> Result<WorkOutcome, BusError> {
        match envelope.payload() {
            Some(payload) => Self::perform(bus, payload).await,
            None => Self::perform_attributes(bus, Attributes::new()).await,
        }
    }

    /// Runs a task given its decoded attributes.
    pub async fn perform_attributes(
        bus: &Bus,
        attributes: Attributes,
    ) -> Result<WorkOutcome, BusError> {
        let name = stringify(attributes.get(keys::CLASS_PROXY));
        let Some(proxy) = bus.proxies().get(&name) else {
            warn!(proxy = %name, "unknown proxy, dropping task");
            return Ok(WorkOutcome::UnknownProxy { name });
        };

        debug!(proxy = %name, "worker running");
        let args = attributes.clone();
        bus.middleware()
            .run(&attributes, move || async move { proxy.perform(bus, args).await })
            .await?;
        Ok(WorkOutcome::Performed { proxy: name })
    }
}
