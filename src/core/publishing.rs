//! # Publishing.
//!
//! ```text
//! publish(e, attrs)       ─► metadata ─► local mode? ─► Local
//!                                      └─► enqueue_to(bus_incoming, Driver)
//! publish_at(t, e, attrs) ─► metadata ─► enqueue_at(t, bus_incoming, Publisher)
//! ```
//!
//! ## Rules
//! - Caller attributes override stamped metadata; `before_publish` sees the merged map.
//! - A delayed event gets its `bus_published_at` when it is actually published,
//!   unless the caller set one.
//! - Every envelope runs the worker; the proxy goes in `bus_class_proxy`.

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::bus::Bus;
use crate::attributes::{keys, stringify, Attributes};
use crate::context::ExecutionContext;
use crate::error::BusError;
use crate::proxies::{DRIVER, PUBLISHER, WORKER};

impl Bus {
    /// Stamps the reserved metadata onto `attributes` for event `event_type`.
    pub fn publish_metadata(&self, event_type: &str, attributes: Attributes) -> Attributes {
        let now = self.now();
        let mut out = Attributes::new();
        out.insert(keys::PUBLISHED_AT.into(), Value::from(now));
        out.insert(keys::EVENT_TYPE.into(), Value::from(event_type));
        out.insert(
            keys::ID.into(),
            Value::from(format!("{}-{}", now, Uuid::new_v4())),
        );
        out.insert(
            keys::APP_HOSTNAME.into(),
            Value::from(self.cfg.hostname.clone()),
        );
        out.insert(
            keys::CONTEXT.into(),
            self.cfg.context.clone().unwrap_or(Value::Null),
        );
        if let Some(ctx) = ExecutionContext::current() {
            if let Some(locale) = ctx.locale {
                out.insert(keys::LOCALE.into(), Value::from(locale));
            }
            if let Some(timezone) = ctx.timezone {
                out.insert(keys::TIMEZONE.into(), Value::from(timezone));
            }
        }

        out.extend(attributes);
        if let Some(callback) = &self.cfg.before_publish {
            callback(&mut out);
        }
        out
    }

    /// Publishes `event_type` to every matching subscription.
    pub async fn publish(&self, event_type: &str, attributes: Attributes) -> Result<(), BusError> {
        let to_publish = self.publish_metadata(event_type, attributes);
        info!(event_type, id = %stringify(to_publish.get(keys::ID)), "event published");

        match self.local_mode() {
            Some(mode) => self.publish_local(mode, to_publish).await,
            None => {
                let incoming = self.cfg.incoming_queue.clone();
                self.enqueue_to(&incoming, DRIVER, to_publish).await
            }
        }
    }

    /// Publishes `event_type` at `epoch_seconds` through the delayed queue.
    pub async fn publish_at(
        &self,
        epoch_seconds: i64,
        event_type: &str,
        attributes: Attributes,
    ) -> Result<(), BusError> {
        let caller_published_at = attributes.contains_key(keys::PUBLISHED_AT);
        let mut to_publish = self.publish_metadata(event_type, attributes);
        to_publish
            .entry(keys::DELAYED_UNTIL)
            .or_insert_with(|| Value::from(epoch_seconds));
        if !caller_published_at {
            to_publish.remove(keys::PUBLISHED_AT);
        }
        to_publish.insert(keys::CLASS_PROXY.into(), Value::from(PUBLISHER));

        info!(event_type, publish_at = epoch_seconds, "event scheduled");
        let payload = serde_json::to_string(&to_publish)?;
        self.queue
            .enqueue_at(epoch_seconds, &self.cfg.incoming_queue, WORKER, payload)
            .await
    }

    /// Enqueues a worker task on `queue` that will run proxy `proxy_class`.
    pub async fn enqueue_to(
        &self,
        queue: &str,
        proxy_class: &str,
        mut attributes: Attributes,
    ) -> Result<(), BusError> {
        attributes.insert(keys::CLASS_PROXY.into(), Value::from(proxy_class));
        let payload = serde_json::to_string(&attributes)?;
        self.queue.enqueue(queue, WORKER, payload).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::attributes::Attributes;
    use crate::clock::ManualClock;
    use crate::config::BusConfig;
    use crate::context::ExecutionContext;
    use crate::core::{Bus, BusBuilder};
    use crate::queue::StoreQueue;
    use crate::store::{MemoryStore, StoreRef};

    fn attrs(v: serde_json::Value) -> Attributes {
        v.as_object().cloned().unwrap()
    }

    fn bus_with(cfg: BusConfig) -> (Arc<Bus>, StoreQueue) {
        let store: StoreRef = MemoryStore::arc();
        let bus = BusBuilder::new(cfg)
            .with_store(store.clone())
            .with_clock(ManualClock::arc(1_000))
            .build();
        (bus, StoreQueue::new(store))
    }

    #[tokio::test]
    async fn test_metadata_is_stamped() {
        let mut cfg = BusConfig::default();
        cfg.hostname = "box-1".into();
        cfg.context = Some(json!("ctx"));
        let (bus, _) = bus_with(cfg);

        let out = bus.publish_metadata("user_created", attrs(json!({"id": 7})));
        assert_eq!(out["bus_published_at"], 1_000);
        assert_eq!(out["bus_event_type"], "user_created");
        assert_eq!(out["bus_app_hostname"], "box-1");
        assert_eq!(out["bus_context"], "ctx");
        assert_eq!(out["id"], 7);
        assert!(out["bus_id"].as_str().unwrap().starts_with("1000-"));
        assert!(!out.contains_key("bus_locale"));
    }

    #[tokio::test]
    async fn test_caller_attributes_override_metadata() {
        let (bus, _) = bus_with(BusConfig::default());
        let out = bus.publish_metadata(
            "user_created",
            attrs(json!({"bus_published_at": 5, "bus_event_type": "other"})),
        );
        assert_eq!(out["bus_published_at"], 5);
        assert_eq!(out["bus_event_type"], "other");
    }

    #[tokio::test]
    async fn test_context_is_stamped_from_scope() {
        let (bus, _) = bus_with(BusConfig::default());
        let ctx = ExecutionContext::new(Some("fr".into()), Some("CET".into()));
        let out = ctx
            .scope(async { bus.publish_metadata("e", Attributes::new()) })
            .await;
        assert_eq!(out["bus_locale"], "fr");
        assert_eq!(out["bus_timezone"], "CET");
    }

    #[tokio::test]
    async fn test_before_publish_runs_last() {
        let mut cfg = BusConfig::default();
        cfg.before_publish = Some(Arc::new(|attrs: &mut Attributes| {
            attrs.insert("stamped".into(), json!(true));
            attrs.remove("secret");
        }));
        let (bus, _) = bus_with(cfg);
        let out = bus.publish_metadata("e", attrs(json!({"secret": "x"})));
        assert_eq!(out["stamped"], true);
        assert!(!out.contains_key("secret"));
    }

    #[tokio::test]
    async fn test_publish_enqueues_driver_task() {
        let (bus, queue) = bus_with(BusConfig::default());
        bus.publish("user_created", attrs(json!({"id": 1}))).await.unwrap();

        let env = queue.pop("bus_incoming").await.unwrap().unwrap();
        assert_eq!(env.class, "queuebus::Worker");
        let payload: Attributes = serde_json::from_str(env.payload().unwrap()).unwrap();
        assert_eq!(payload["bus_class_proxy"], "queuebus::Driver");
        assert_eq!(payload["bus_event_type"], "user_created");
        assert_eq!(payload["id"], 1);
    }

    #[tokio::test]
    async fn test_publish_at_schedules_publisher_task() {
        let (bus, queue) = bus_with(BusConfig::default());
        bus.publish_at(2_000, "later", attrs(json!({"x": "y"})))
            .await
            .unwrap();

        assert!(queue.pop("bus_incoming").await.unwrap().is_none());
        assert_eq!(queue.scheduled().await.unwrap(), vec![2_000]);
        assert_eq!(queue.promote_due(2_000).await.unwrap(), 1);

        let env = queue.pop("bus_incoming").await.unwrap().unwrap();
        let payload: Attributes = serde_json::from_str(env.payload().unwrap()).unwrap();
        assert_eq!(payload["bus_class_proxy"], "queuebus::Publisher");
        assert_eq!(payload["bus_delayed_until"], 2_000);
        assert_eq!(payload["bus_event_type"], "later");
        assert!(!payload.contains_key("bus_published_at"));
    }

    #[tokio::test]
    async fn test_publish_at_keeps_caller_published_at() {
        let (bus, queue) = bus_with(BusConfig::default());
        bus.publish_at(
            2_000,
            "later",
            attrs(json!({"bus_published_at": 42, "bus_delayed_until": 9})),
        )
        .await
        .unwrap();
        queue.promote_due(2_000).await.unwrap();
        let env = queue.pop("bus_incoming").await.unwrap().unwrap();
        let payload: Attributes = serde_json::from_str(env.payload().unwrap()).unwrap();
        assert_eq!(payload["bus_published_at"], 42);
        assert_eq!(payload["bus_delayed_until"], 9);
    }
}
