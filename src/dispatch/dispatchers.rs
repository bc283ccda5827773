//! # Process-wide namespace table.
//!
//! [`Dispatchers`] maps app keys to [`Dispatch`]es. Namespaces are created the first
//! time something registers into them. Riders look up `(app_key, sub_key)` here to
//! run subscriber code.
//!
//! ## Rules
//! - The table lock is never held while a handler runs: the subscription is cloned
//!   out under a read lock and executed afterwards.
//! - Unknown namespaces and keys are not errors; they are logged at `warn` and
//!   reported through [`ExecuteOutcome`].

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::namespace::Dispatch;
use crate::attributes::Attributes;
use crate::error::BusError;
use crate::registry::{normalize_app_key, MatchedSubscription};
use crate::subscriptions::SubscriptionList;

/// Result of [`Dispatchers::execute`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The handler ran and returned `Ok`.
    Executed,
    /// No namespace with this key is registered in this process.
    UnknownApp {
        /// App key from the task.
        app_key: String,
    },
    /// The namespace exists but has no such subscription.
    UnknownKey {
        /// App key from the task.
        app_key: String,
        /// Subscription key from the task.
        sub_key: String,
    },
}

impl ExecuteOutcome {
    /// Returns a short stable label for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecuteOutcome::Executed => "executed",
            ExecuteOutcome::UnknownApp { .. } => "unknown_app",
            ExecuteOutcome::UnknownKey { .. } => "unknown_key",
        }
    }
}

/// All in-process namespaces.
#[derive(Debug, Default)]
pub struct Dispatchers {
    default_app_key: Option<String>,
    default_queue: Option<String>,
    inner: RwLock<HashMap<String, Dispatch>>,
}

impl Dispatchers {
    /// Creates an empty table; `default_app_key` is used by `dispatch(None, ..)`.
    pub fn new(default_app_key: Option<String>) -> Self {
        Self {
            default_app_key,
            default_queue: None,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the queue new namespaces use for `Dispatch::subscribe`.
    pub fn with_default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = Some(queue.into());
        self
    }

    /// Runs `f` against the namespace `app_key`, creating it if needed.
    ///
    /// `None` selects the configured default namespace; without one, this fails
    /// with [`BusError::InvalidAppKey`].
    ///
    /// # Example
    /// ```
    /// # tokio_test_block(async {
    /// use queuebus::{Attributes, Dispatchers, ExecutionContext, HandlerFn};
    ///
    /// let d = Dispatchers::new(Some("my_app".into()));
    /// d.dispatch(None, |app| {
    ///     app.subscribe("user_created", None, HandlerFn::arc(
    ///         |_ctx: ExecutionContext, _attrs: Attributes| async { Ok(()) },
    ///     ))?;
    ///     Ok(())
    /// }).await.unwrap();
    /// assert_eq!(d.app_keys().await, vec!["my_app"]);
    /// # });
    /// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
    /// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
    /// # }
    /// ```
    pub async fn dispatch<R, F>(&self, app_key: Option<&str>, f: F) -> Result<R, BusError>
    where
        F: FnOnce(&mut Dispatch) -> Result<R, BusError>,
    {
        let name = app_key
            .map(str::to_string)
            .or_else(|| self.default_app_key.clone())
            .unwrap_or_default();
        let key = normalize_app_key(&name)?;

        let mut map = self.inner.write().await;
        if !map.contains_key(&key) {
            let mut dispatch = Dispatch::new(&key)?;
            if let Some(queue) = &self.default_queue {
                dispatch = dispatch.with_default_queue(queue.clone());
            }
            debug!(app_key = %key, "created namespace");
            map.insert(key.clone(), dispatch);
        }
        match map.get_mut(&key) {
            Some(dispatch) => f(dispatch),
            None => Err(BusError::InvalidAppKey { name }),
        }
    }

    /// Runs subscription `sub_key` of namespace `app_key` with `attributes`.
    pub async fn execute(
        &self,
        app_key: &str,
        sub_key: &str,
        attributes: Attributes,
    ) -> Result<ExecuteOutcome, BusError> {
        let sub = {
            let map = self.inner.read().await;
            let Some(dispatch) = map.get(app_key) else {
                warn!(app_key, sub_key, "no namespace registered for task");
                return Ok(ExecuteOutcome::UnknownApp {
                    app_key: app_key.to_string(),
                });
            };
            match dispatch.subscriptions().key(sub_key) {
                Some(sub) => sub.clone(),
                None => {
                    warn!(app_key, sub_key, "no subscription registered for task");
                    return Ok(ExecuteOutcome::UnknownKey {
                        app_key: app_key.to_string(),
                        sub_key: sub_key.to_string(),
                    });
                }
            }
        };
        sub.execute(attributes).await?;
        Ok(ExecuteOutcome::Executed)
    }

    /// Registered app keys, sorted.
    pub async fn app_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Subscriptions of namespace `app_key`, if it exists.
    pub async fn subscriptions(&self, app_key: &str) -> Option<SubscriptionList> {
        self.inner
            .read()
            .await
            .get(app_key)
            .map(|d| d.subscriptions().clone())
    }

    /// Every local subscription accepting `attributes`, across namespaces.
    pub async fn subscription_matches(&self, attributes: &Attributes) -> Vec<MatchedSubscription> {
        let map = self.inner.read().await;
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|k| map.get(k))
            .flat_map(|d| d.subscription_matches(attributes))
            .collect()
    }

    /// Copy of every namespace, sorted by app key.
    pub async fn snapshot(&self) -> Vec<Dispatch> {
        let map = self.inner.read().await;
        let mut out: Vec<Dispatch> = map.values().cloned().collect();
        out.sort_by(|a, b| a.app_key().cmp(b.app_key()));
        out
    }
}
