//! In-process subscription registration.
//!
//! This module groups the types applications use to declare what they listen to,
//! and the table riders use to find the code to run.
//!
//! ## Contents
//! - [`Dispatch`]          one namespace: subscribe / dispatch_event / on_heartbeat
//! - [`Dispatchers`]       app key → Dispatch, created lazily
//! - [`HeartbeatSchedule`] exact fields and intervals for heartbeat subscriptions
//! - [`ExecuteOutcome`]    what happened to a rider task
//!
//! ## Quick wiring
//! ```text
//! Dispatchers::dispatch(Some("app"), |d| d.subscribe("user_created", None, handler))
//!      └─► persisted by Bus::subscribe_all as bus_app:app
//!           - Driver routes matching events to queue app_default
//!           - Rider calls Dispatchers::execute("app", "user_created", attrs)
//! ```

mod dispatchers;
mod heartbeat;
mod namespace;

pub use dispatchers::{Dispatchers, ExecuteOutcome};
pub use heartbeat::{HeartbeatSchedule, HEARTBEAT_EVENT};
pub use namespace::Dispatch;
