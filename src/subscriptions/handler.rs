//! # Subscriber handlers.
//!
//! A [`Handler`] is the in-process code bound to a subscription. It receives the
//! [`ExecutionContext`] of the run and the full attribute map of the delivered task.
//! The common handle type is [`HandlerRef`], an `Arc<dyn Handler>`.
//!
//! [`HandlerFn`] wraps a closure `F: Fn(ExecutionContext, Attributes) -> Fut`,
//! producing a fresh future per call.
//!
//! ## Example
//! ```rust
//! use queuebus::{Attributes, ExecutionContext, HandlerError, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef = HandlerFn::arc(|_ctx: ExecutionContext, attrs: Attributes| async move {
//!     if attrs.is_empty() {
//!         return Err(HandlerError::fatal("no attributes"));
//!     }
//!     Ok(())
//! });
//! # let _ = h;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::attributes::Attributes;
use crate::context::ExecutionContext;
use crate::error::HandlerError;

/// Subscriber code invoked when a routed task is executed.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handles one delivered task.
    async fn call(&self, ctx: ExecutionContext, attributes: Attributes) -> Result<(), HandlerError>;
}

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// Function-backed handler.
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Fut> HandlerFn<F>
where
    F: Fn(ExecutionContext, Attributes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(ExecutionContext, Attributes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn call(&self, ctx: ExecutionContext, attributes: Attributes) -> Result<(), HandlerError> {
        (self.f)(ctx, attributes).await
    }
}
