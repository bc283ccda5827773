//! # One namespace's in-process subscriptions.
//!
//! [`Dispatch`] is where an application declares what it listens to. Every
//! subscription it creates is routed to `<app_key>_<queue>` and executed by the
//! rider proxy, which comes back here to run the bound handler.

use std::sync::Arc;

use tracing::warn;

use super::heartbeat::{HeartbeatGate, HeartbeatSchedule};
use crate::attributes::Attributes;
use crate::error::BusError;
use crate::matcher::Matcher;
use crate::proxies::RIDER;
use crate::registry::{normalize_app_key, MatchedSubscription};
use crate::subscriptions::{HandlerRef, Subscription, SubscriptionList};

/// Subscriptions with live handlers for one namespace.
#[derive(Clone, Debug)]
pub struct Dispatch {
    app_key: String,
    default_queue: String,
    subscriptions: SubscriptionList,
}

impl Dispatch {
    /// Creates the namespace `app_key` (normalized).
    pub fn new(app_key: &str) -> Result<Self, BusError> {
        Ok(Self {
            app_key: normalize_app_key(app_key)?,
            default_queue: "default".to_string(),
            subscriptions: SubscriptionList::new(),
        })
    }

    /// Uses `queue` instead of `default` for [`Dispatch::subscribe`].
    pub fn with_default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = queue.into();
        self
    }

    /// Normalized app key.
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// Registered subscriptions.
    pub fn subscriptions(&self) -> &SubscriptionList {
        &self.subscriptions
    }

    /// Number of registered subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Subscribes `handler` on the default queue.
    ///
    /// Without a matcher, the subscription matches `bus_event_type == key`.
    pub fn subscribe(
        &mut self,
        key: impl Into<String>,
        matcher: Option<Matcher>,
        handler: HandlerRef,
    ) -> Result<&Subscription, BusError> {
        let queue = self.default_queue.clone();
        self.dispatch_event(&queue, key, matcher, handler)
    }

    /// Subscribes `handler` on `<app_key>_<queue>`.
    pub fn dispatch_event(
        &mut self,
        queue: &str,
        key: impl Into<String>,
        matcher: Option<Matcher>,
        handler: HandlerRef,
    ) -> Result<&Subscription, BusError> {
        let key = key.into();
        let matcher = matcher.unwrap_or_else(|| Matcher::event_type(key.clone()));
        let queue_name = format!("{}_{}", self.app_key, queue);
        self.subscriptions
            .add(Subscription::register(queue_name, key, RIDER, matcher, handler))
    }

    /// Subscribes `handler` to heartbeat minutes selected by `schedule`.
    pub fn on_heartbeat(
        &mut self,
        key: impl Into<String>,
        schedule: HeartbeatSchedule,
        handler: HandlerRef,
    ) -> Result<&Subscription, BusError> {
        schedule.validate()?;
        let gate: HandlerRef = Arc::new(HeartbeatGate::new(schedule, handler));
        self.subscribe(key, Some(schedule.matcher()), gate)
    }

    /// Runs subscription `key` with `attributes`; an unknown key is logged and skipped.
    pub async fn execute(&self, key: &str, attributes: Attributes) -> Result<bool, BusError> {
        match self.subscriptions.key(key) {
            Some(sub) => {
                sub.execute(attributes).await?;
                Ok(true)
            }
            None => {
                warn!(app_key = %self.app_key, sub_key = key, "no subscription for key");
                Ok(false)
            }
        }
    }

    /// Local subscriptions accepting `attributes`, tagged with this app key.
    pub fn subscription_matches(&self, attributes: &Attributes) -> Vec<MatchedSubscription> {
        self.subscriptions
            .matches(attributes)
            .into_iter()
            .map(|sub| MatchedSubscription::new(&self.app_key, sub.clone()))
            .collect()
    }
}
