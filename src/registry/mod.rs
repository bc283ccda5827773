//! # Persisted subscription registry.
//!
//! - [`Application`] one namespace's table in the store
//! - [`MatchedSubscription`] a routing hit, tagged with the namespace it came from
//! - [`normalize_app_key`] namespace name normalization

mod application;

pub use application::{normalize_app_key, Application, APP_LIST_KEY, APP_SINGLE_KEY};

use crate::subscriptions::Subscription;

/// A subscription that accepted an event, with the namespace that owns it.
#[derive(Clone, Debug)]
pub struct MatchedSubscription {
    /// Namespace owning the subscription.
    pub app_key: String,
    /// The matching subscription.
    pub subscription: Subscription,
}

impl MatchedSubscription {
    /// Tags `subscription` with `app_key`.
    pub fn new(app_key: impl Into<String>, subscription: Subscription) -> Self {
        Self {
            app_key: app_key.into(),
            subscription,
        }
    }
}
