//! # queuebus
//!
//! **queuebus** is a publish/subscribe event bus layered over a work queue and a
//! Redis-shaped key-value store.
//!
//! Applications publish named events with flat attribute maps. Other applications
//! declare subscriptions (filters over those attributes) and the queue each matching
//! event should be delivered to. Publishers never know who is listening.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  app A                                     app B
//! ┌──────────────────┐                      ┌──────────────────────────────────┐
//! │ Bus::publish     │                      │ Dispatchers (in-process)         │
//! │  - metadata      │                      │  app_b: { user_created → handler}│
//! │  - before_publish│                      └──────┬───────────────▲───────────┘
//! └────────┬─────────┘                             │ subscribe_all │ execute
//!          ▼                                       ▼               │
//!   queue bus_incoming              store: bus_apps, bus_app:app_b │
//!   [Worker{proxy=Driver}]                         │               │
//!          │                                       │               │
//!          ▼                                       │               │
//!   Worker ─► Driver ─── match every Application ◄─┘               │
//!                │                                                 │
//!                ▼ one task per matching subscription              │
//!   queue app_b_default [Worker{proxy=Rider}]                      │
//!                │                                                 │
//!                ▼                                                 │
//!   Worker ─► middleware ─► Rider ─────────────────────────────────┘
//! ```
//!
//! ### Heartbeat
//! ```text
//! heartbeat::run(bus, every, token)
//! loop {
//!   ├─► lock: setnx / getset on bus:heartbeat:lock
//!   ├─► for each missed minute since bus:heartbeat:timestamp:
//!   │       publish heartbeat_minutes { epoch_*, minute, hour, wday, ... }
//!   └─► unlock
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                | Key types / traits                         |
//! |-------------------|------------------------------------------------------------|--------------------------------------------|
//! | **Matching**      | Literal, pattern and special-token filters over attributes | [`Matcher`], [`FilterSpec`], [`Special`]   |
//! | **Subscriptions** | Routing rules, handlers and the persisted registry         | [`Subscription`], [`Handler`], [`Dispatch`]|
//! | **Bus**           | Publish, publish-at, local mode, registry tasks            | [`Bus`], [`BusBuilder`], [`BusConfig`]     |
//! | **Execution**     | Worker, proxies and middleware                             | [`Worker`], [`Proxy`], [`Middleware`]      |
//! | **Heartbeat**     | Distributed minute clock with backfill                     | [`Heartbeat`], [`HeartbeatSchedule`]       |
//! | **Collaborators** | Store and queue contracts with in-memory implementations   | [`Store`], [`MemoryStore`], [`StoreQueue`] |
//! | **Errors**        | Typed errors for registration, routing and handlers        | [`BusError`], [`HandlerError`]             |
//!
//! ## Optional features
//! - `redis`: exposes `store::RedisStore`, a [`Store`] over `redis::aio::ConnectionManager`.
//!
//! ## Example
//! ```rust
//! use queuebus::{Attributes, BusBuilder, BusConfig, ExecutionContext, HandlerFn, StoreQueue, Worker};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = BusConfig::default();
//!     cfg.default_app_key = Some("billing".into());
//!     let bus = BusBuilder::new(cfg).build();
//!
//!     bus.dispatch(None, |app| {
//!         app.subscribe("invoice_paid", None, HandlerFn::arc(
//!             |_ctx: ExecutionContext, attrs: Attributes| async move {
//!                 println!("paid: {:?}", attrs.get("invoice_id"));
//!                 Ok(())
//!             },
//!         ))?;
//!         Ok(())
//!     }).await?;
//!     bus.subscribe_all().await?;
//!
//!     let mut attrs = Attributes::new();
//!     attrs.insert("invoice_id".into(), 42.into());
//!     bus.publish("invoice_paid", attrs).await?;
//!
//!     // Drain the two hops by hand: incoming (driver), then the app queue (rider).
//!     let queue = StoreQueue::new(bus.store().clone());
//!     for name in ["bus_incoming", "billing_default"] {
//!         while let Some(task) = queue.pop(name).await? {
//!             Worker::perform_envelope(&bus, &task).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
pub mod attributes;
mod clock;
mod config;
mod context;
mod core;
mod dispatch;
mod error;
pub mod heartbeat;
mod matcher;
pub mod middleware;
pub mod proxies;
pub mod queue;
pub mod registry;
pub mod store;
mod subscriptions;

// ---- Public re-exports ----

pub use attributes::Attributes;
pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use config::{BeforePublish, BusConfig, LocalMode};
pub use context::ExecutionContext;
pub use core::{Bus, BusBuilder};
pub use dispatch::{Dispatch, Dispatchers, ExecuteOutcome, HeartbeatSchedule, HEARTBEAT_EVENT};
pub use error::{BusError, HandlerError, StoreError};
pub use heartbeat::Heartbeat;
pub use matcher::{FilterSpec, Matcher, Special};
pub use middleware::{Middleware, MiddlewareRef, MiddlewareStack, Next, TracingMiddleware};
pub use proxies::{Proxy, ProxyRef, ProxyRegistry, WorkOutcome, Worker};
pub use queue::{Envelope, QueueBackend, QueueRef, StoreQueue};
pub use registry::{Application, MatchedSubscription};
pub use store::{MemoryStore, Store, StoreRef};
pub use subscriptions::{Handler, HandlerFn, HandlerRef, StoredSubscription, Subscription, SubscriptionList};
