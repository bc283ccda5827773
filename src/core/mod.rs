//! Runtime core: the bus object and its operations.
//!
//! The only public API from this module is [`Bus`] and its [`BusBuilder`]. A bus
//! owns everything a process needs to publish, route and execute events.
//!
//! Internal modules:
//! - [`bus`]: the [`Bus`] handle and its accessors;
//! - [`builder`]: assembles a bus with default collaborators;
//! - [`publishing`]: metadata stamping, `publish`, `publish_at`, `enqueue_to`;
//! - [`local`]: local-mode publishing (inline, standalone, suppress);
//! - [`tasks`]: deploy-time registry operations (subscribe/unsubscribe all).

mod builder;
mod bus;
mod local;
mod publishing;
mod tasks;

pub use builder::BusBuilder;
pub use bus::Bus;
