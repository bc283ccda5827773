//! # A single routing rule.
//!
//! [`Subscription`] says: events accepted by `matcher` go to `queue_name`, and the
//! worker there runs `class_name` for subscription `key`. The `executor` only exists
//! in the process that registered the subscription; copies read back from the store
//! carry none.
//!
//! Persisted as [`StoredSubscription`]:
//! ```text
//! {"queue_name":"app_default","key":"event_one","class":"queuebus::Rider","matcher":{"bus_event_type":"event_one"}}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::handler::HandlerRef;
use crate::attributes::Attributes;
use crate::context::ExecutionContext;
use crate::error::BusError;
use crate::matcher::Matcher;

/// Routing rule plus its optional in-process handler.
#[derive(Clone)]
pub struct Subscription {
    queue_name: String,
    key: String,
    class_name: String,
    matcher: Matcher,
    executor: Option<HandlerRef>,
}

/// Persisted record of a subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSubscription {
    /// Normalized queue name.
    pub queue_name: String,
    /// Subscription key.
    pub key: String,
    /// Class the worker resolves.
    #[serde(rename = "class")]
    pub class_name: String,
    /// Matcher in its string form.
    pub matcher: BTreeMap<String, String>,
}

impl Subscription {
    /// Creates a subscription without a handler.
    pub fn new(
        queue_name: impl AsRef<str>,
        key: impl Into<String>,
        class_name: impl Into<String>,
        matcher: Matcher,
    ) -> Self {
        Self {
            queue_name: Self::normalize(queue_name.as_ref()),
            key: key.into(),
            class_name: class_name.into(),
            matcher,
            executor: None,
        }
    }

    /// Creates a subscription bound to `handler`.
    pub fn register(
        queue_name: impl AsRef<str>,
        key: impl Into<String>,
        class_name: impl Into<String>,
        matcher: Matcher,
        handler: HandlerRef,
    ) -> Self {
        let mut sub = Self::new(queue_name, key, class_name, matcher);
        sub.executor = Some(handler);
        sub
    }

    /// Replaces every non-word character with `_` and lowercases.
    ///
    /// # Example
    /// ```
    /// use queuebus::Subscription;
    ///
    /// assert_eq!(Subscription::normalize("My-App.Default"), "my_app_default");
    /// ```
    pub fn normalize(value: &str) -> String {
        value
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Normalized queue name.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Subscription key, unique within its namespace.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Class the worker resolves for this subscription.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Matcher deciding which events this subscription receives.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// True when a handler is bound in this process.
    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }

    /// True when the matcher accepts `attributes`.
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.matcher.matches(Some(attributes))
    }

    /// Runs the handler with the locale/timezone of `attributes` installed.
    ///
    /// Values absent from `attributes` are inherited from the enclosing context.
    /// Fails with [`BusError::NoExecutor`] when no handler is bound.
    pub async fn execute(&self, attributes: Attributes) -> Result<(), BusError> {
        let handler = self.executor.clone().ok_or_else(|| BusError::NoExecutor {
            key: self.key.clone(),
        })?;
        let ctx = ExecutionContext::current()
            .unwrap_or_default()
            .overlay(ExecutionContext::from_attributes(&attributes));
        ctx.clone()
            .scope(async move { handler.call(ctx, attributes).await })
            .await
            .map_err(BusError::from)
    }

    /// Persisted form.
    pub fn to_wire(&self) -> StoredSubscription {
        StoredSubscription {
            queue_name: self.queue_name.clone(),
            key: self.key.clone(),
            class_name: self.class_name.clone(),
            matcher: self.matcher.to_wire(),
        }
    }

    /// Decodes a persisted record.
    ///
    /// Returns `None` for anything that is not a record, or a record whose key
    /// or queue name is empty.
    pub fn from_wire(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |name: &str| crate::attributes::stringify(obj.get(name));
        let queue_name = text("queue_name");
        let key = text("key");
        if key.is_empty() || queue_name.is_empty() {
            return None;
        }
        let matcher = match obj.get("matcher") {
            Some(Value::Object(m)) => Matcher::from_wire(
                m.iter()
                    .map(|(k, v)| (k.clone(), crate::attributes::stringify(Some(v)))),
            ),
            _ => Matcher::new(),
        };
        Some(Self::new(queue_name, key, text("class"), matcher))
    }
}

impl From<&StoredSubscription> for Subscription {
    fn from(stored: &StoredSubscription) -> Self {
        Self::new(
            &stored.queue_name,
            stored.key.clone(),
            stored.class_name.clone(),
            Matcher::from_wire(stored.matcher.iter()),
        )
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("queue_name", &self.queue_name)
            .field("key", &self.key)
            .field("class_name", &self.class_name)
            .field("matcher", &self.matcher)
            .field("executor", &self.executor.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::subscriptions::HandlerFn;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_queue_name_is_normalized() {
        let sub = Subscription::new("Some-Queue Name", "k", "C", Matcher::event_type("x"));
        assert_eq!(sub.queue_name(), "some_queue_name");
    }

    #[test]
    fn test_wire_uses_class_field() {
        let sub = Subscription::new("app_default", "event_one", "queuebus::Rider", Matcher::event_type("event_one"));
        let value = serde_json::to_value(sub.to_wire()).unwrap();
        assert_eq!(
            value,
            json!({
                "queue_name": "app_default",
                "key": "event_one",
                "class": "queuebus::Rider",
                "matcher": {"bus_event_type": "event_one"}
            })
        );
        let back = Subscription::from_wire(&value).unwrap();
        assert_eq!(back.key(), "event_one");
        assert_eq!(back.class_name(), "queuebus::Rider");
        assert_eq!(back.matcher(), sub.matcher());
        assert!(!back.has_executor());
    }

    #[test]
    fn test_from_wire_rejects_incomplete_records() {
        assert!(Subscription::from_wire(&json!("legacy string")).is_none());
        assert!(Subscription::from_wire(&json!({"queue_name": "q", "key": ""})).is_none());
        assert!(Subscription::from_wire(&json!({"key": "k"})).is_none());
    }

    #[tokio::test]
    async fn test_execute_without_handler_is_error() {
        let sub = Subscription::new("q", "k", "C", Matcher::event_type("x"));
        let err = sub.execute(Attributes::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "bus_no_executor");
    }

    #[tokio::test]
    async fn test_execute_installs_context() {
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        let handler = HandlerFn::arc(move |ctx: ExecutionContext, _attrs: Attributes| {
            let s = s.clone();
            async move {
                *s.lock().unwrap() = Some((ctx, ExecutionContext::current()));
                Ok(())
            }
        });
        let sub = Subscription::register("q", "k", "C", Matcher::event_type("x"), handler);
        let attrs = json!({"bus_locale": "en", "bus_timezone": "PST"})
            .as_object()
            .cloned()
            .unwrap();
        sub.execute(attrs).await.unwrap();

        let (ctx, current) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(ctx.locale.as_deref(), Some("en"));
        assert_eq!(current, Some(ctx));
        assert_eq!(ExecutionContext::current(), None);
    }

    #[tokio::test]
    async fn test_execute_propagates_handler_error() {
        let handler = HandlerFn::arc(|_ctx: ExecutionContext, _attrs: Attributes| async {
            Err(HandlerError::fail("boom"))
        });
        let sub = Subscription::register("q", "k", "C", Matcher::event_type("x"), handler);
        let err = sub.execute(Attributes::new()).await.unwrap_err();
        assert!(matches!(err, BusError::Handler(HandlerError::Fail { .. })));
    }
}
