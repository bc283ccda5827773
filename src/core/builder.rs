use std::sync::Arc;

use crate::{
    clock::{ClockRef, SystemClock},
    config::BusConfig,
    dispatch::Dispatchers,
    middleware::{MiddlewareRef, MiddlewareStack},
    proxies::{ProxyRef, ProxyRegistry},
    queue::{QueueRef, StoreQueue},
    store::{MemoryStore, StoreRef},
};
use super::bus::Bus;

/// Builder for constructing a [`Bus`] with optional collaborators.
pub struct BusBuilder {
    cfg: BusConfig,
    store: Option<StoreRef>,
    queue: Option<QueueRef>,
    clock: Option<ClockRef>,
    middleware: MiddlewareStack,
    proxies: ProxyRegistry,
}

impl BusBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            store: None,
            queue: None,
            clock: None,
            middleware: MiddlewareStack::new(),
            proxies: ProxyRegistry::with_defaults(),
        }
    }

    /// Sets the key-value store. Defaults to a fresh [`MemoryStore`].
    pub fn with_store(mut self, store: StoreRef) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the queue backend.
    ///
    /// Defaults to a [`StoreQueue`] over the bus store, so a single store carries
    /// the registry and the queues.
    pub fn with_queue(mut self, queue: QueueRef) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Sets the clock. Defaults to [`SystemClock`].
    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Appends a middleware; the first one pushed runs outermost.
    pub fn with_middleware(mut self, middleware: MiddlewareRef) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Registers an extra proxy, or replaces a built-in one with the same name.
    pub fn with_proxy(mut self, proxy: ProxyRef) -> Self {
        self.proxies.register(proxy);
        self
    }

    /// Builds and returns the Bus instance.
    pub fn build(self) -> Arc<Bus> {
        let store: StoreRef = match self.store {
            Some(store) => store,
            None => MemoryStore::arc(),
        };
        let queue: QueueRef = match self.queue {
            Some(queue) => queue,
            None => Arc::new(StoreQueue::new(store.clone())),
        };
        let clock: ClockRef = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let dispatchers = Dispatchers::new(self.cfg.default_app_key.clone())
            .with_default_queue(self.cfg.default_queue.clone());

        Arc::new(Bus {
            cfg: Arc::new(self.cfg),
            store,
            queue,
            clock,
            dispatchers: Arc::new(dispatchers),
            middleware: self.middleware,
            proxies: self.proxies,
        })
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}
