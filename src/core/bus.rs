//! # Bus handle.
//!
//! [`Bus`] is built once by [`BusBuilder`](super::BusBuilder) and shared by `Arc`.
//! Every proxy receives `&Bus`, so nothing in the crate reaches for a global.
//!
//! ```text
//! Bus
//!  ├── BusConfig        queues, hostname, local mode, heartbeat lease
//!  ├── StoreRef         registry hashes, heartbeat lock/marker
//!  ├── QueueRef         enqueue / enqueue_at
//!  ├── ClockRef         epoch seconds
//!  ├── Dispatchers      in-process namespaces and handlers
//!  ├── MiddlewareStack  wraps every proxy run
//!  └── ProxyRegistry    bus_class_proxy → proxy
//! ```

use std::sync::Arc;

use crate::clock::ClockRef;
use crate::config::BusConfig;
use crate::dispatch::{Dispatch, Dispatchers};
use crate::error::BusError;
use crate::middleware::MiddlewareStack;
use crate::proxies::ProxyRegistry;
use crate::queue::QueueRef;
use crate::store::StoreRef;

/// Shared bus state.
pub struct Bus {
    pub(super) cfg: Arc<BusConfig>,
    pub(super) store: StoreRef,
    pub(super) queue: QueueRef,
    pub(super) clock: ClockRef,
    pub(super) dispatchers: Arc<Dispatchers>,
    pub(super) middleware: MiddlewareStack,
    pub(super) proxies: ProxyRegistry,
}

impl Bus {
    /// Configuration the bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.cfg
    }

    /// Key-value store holding the registry and heartbeat state.
    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    /// Queue backend receiving bus tasks.
    pub fn queue(&self) -> &QueueRef {
        &self.queue
    }

    /// Clock used for every bus timestamp.
    pub fn clock(&self) -> &ClockRef {
        &self.clock
    }

    /// Current epoch seconds.
    #[inline]
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// In-process namespaces.
    pub fn dispatchers(&self) -> &Arc<Dispatchers> {
        &self.dispatchers
    }

    /// Middleware wrapped around every proxy run.
    pub fn middleware(&self) -> &MiddlewareStack {
        &self.middleware
    }

    /// Proxies the worker can resolve.
    pub fn proxies(&self) -> &ProxyRegistry {
        &self.proxies
    }

    /// Registers into namespace `app_key` (`None` = configured default).
    ///
    /// Shorthand for [`Dispatchers::dispatch`].
    pub async fn dispatch<R, F>(&self, app_key: Option<&str>, f: F) -> Result<R, BusError>
    where
        F: FnOnce(&mut Dispatch) -> Result<R, BusError>,
    {
        self.dispatchers.dispatch(app_key, f).await
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("cfg", &self.cfg)
            .field("middleware", &self.middleware.len())
            .field("proxies", &self.proxies)
            .finish()
    }
}
