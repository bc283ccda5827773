//! # Deploy-time registry operations.
//!
//! Subscriptions live in two places: handlers in this process ([`Dispatchers`])
//! and routing tables in the store ([`Application`]). These calls push one to
//! the other, and are what a deploy step or an operator runs.
//!
//! [`Dispatchers`]: crate::dispatch::Dispatchers

use tracing::debug;

use super::bus::Bus;
use crate::error::BusError;
use crate::registry::Application;

impl Bus {
    /// Persists every non-empty local namespace; returns the number of subscriptions written.
    pub async fn subscribe_all(&self) -> Result<usize, BusError> {
        let mut count = 0;
        for dispatch in self.dispatchers.snapshot().await {
            if dispatch.is_empty() {
                debug!(app_key = dispatch.app_key(), "skipping empty namespace");
                continue;
            }
            let mut app = Application::new(dispatch.app_key(), self.store.clone())?;
            app.subscribe(dispatch.subscriptions()).await?;
            count += dispatch.len();
        }
        Ok(count)
    }

    /// Removes the persisted table of every local namespace; returns how many were removed.
    pub async fn unsubscribe_all(&self) -> Result<usize, BusError> {
        let mut count = 0;
        for app_key in self.dispatchers.app_keys().await {
            self.unsubscribe_app(&app_key).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Removes the persisted table of namespace `app_key`.
    pub async fn unsubscribe_app(&self, app_key: &str) -> Result<(), BusError> {
        let mut app = Application::new(app_key, self.store.clone())?;
        app.unsubscribe().await
    }

    /// Removes the persisted subscriptions of `app_key` delivering to `queue`.
    pub async fn unsubscribe_queue(&self, app_key: &str, queue: &str) -> Result<usize, BusError> {
        let mut app = Application::new(app_key, self.store.clone())?;
        app.unsubscribe_queue(queue).await
    }

    /// Queues local workers should listen on, in first-seen order.
    ///
    /// Reads only in-process registrations, never the store.
    pub async fn queue_names(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for dispatch in self.dispatchers.snapshot().await {
            for sub in dispatch.subscriptions().all() {
                if !out.iter().any(|q| q == sub.queue_name()) {
                    out.push(sub.queue_name().to_string());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::attributes::Attributes;
    use crate::config::BusConfig;
    use crate::context::ExecutionContext;
    use crate::core::{Bus, BusBuilder};
    use crate::registry::Application;
    use crate::store::{MemoryStore, Store, StoreRef};
    use crate::subscriptions::{HandlerFn, HandlerRef};

    fn noop() -> HandlerRef {
        HandlerFn::arc(|_ctx: ExecutionContext, _attrs: Attributes| async { Ok(()) })
    }

    async fn setup() -> (Arc<Bus>, StoreRef) {
        let store: StoreRef = MemoryStore::arc();
        let bus = BusBuilder::new(BusConfig::default())
            .with_store(store.clone())
            .build();
        bus.dispatch(Some("app_one"), |app| {
            app.subscribe("a", None, noop())?;
            app.dispatch_event("slow", "b", None, noop())?;
            Ok(())
        })
        .await
        .unwrap();
        bus.dispatch(Some("app_two"), |app| {
            app.subscribe("c", None, noop())?;
            Ok(())
        })
        .await
        .unwrap();
        bus.dispatch(Some("empty_app"), |_| Ok(())).await.unwrap();
        (bus, store)
    }

    #[tokio::test]
    async fn test_subscribe_all_persists_non_empty_namespaces() {
        let (bus, store) = setup().await;
        assert_eq!(bus.subscribe_all().await.unwrap(), 3);

        let mut apps = store.smembers("bus_apps").await.unwrap();
        apps.sort();
        assert_eq!(apps, vec!["app_one", "app_two"]);

        let one = Application::new("app_one", store.clone()).unwrap();
        let subs = one.subscriptions().await.unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs.key("b").map(|s| s.queue_name()), Some("app_one_slow"));
    }

    #[tokio::test]
    async fn test_unsubscribe_operations() {
        let (bus, store) = setup().await;
        bus.subscribe_all().await.unwrap();

        assert_eq!(bus.unsubscribe_queue("app_one", "app_one_slow").await.unwrap(), 1);
        let one = Application::new("app_one", store.clone()).unwrap();
        assert_eq!(one.subscriptions().await.unwrap().len(), 1);

        bus.unsubscribe_app("app_two").await.unwrap();
        assert_eq!(store.smembers("bus_apps").await.unwrap(), vec!["app_one"]);

        assert_eq!(bus.unsubscribe_all().await.unwrap(), 3);
        assert!(store.smembers("bus_apps").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queue_names_are_unique_local_queues() {
        let (bus, _) = setup().await;
        assert_eq!(
            bus.queue_names().await,
            vec!["app_one_default", "app_one_slow", "app_two_default"]
        );
    }
}
