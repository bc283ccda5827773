//! # Subscriptions and their handlers.
//!
//! This module provides the routing-rule types:
//! - [`Subscription`] - one rule: queue, key, class name, matcher, optional handler
//! - [`StoredSubscription`] - the persisted record of a subscription
//! - [`SubscriptionList`] - keyed collection with duplicate/missing-key checks
//! - [`Handler`] / [`HandlerFn`] / [`HandlerRef`] - subscriber code bound in-process

mod handler;
mod list;
mod subscription;

pub use handler::{Handler, HandlerFn, HandlerRef};
pub use list::SubscriptionList;
pub use subscription::{StoredSubscription, Subscription};
