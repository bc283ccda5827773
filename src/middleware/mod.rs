//! # Worker middleware.
//!
//! Middlewares wrap every proxy execution performed by the worker. Each one gets
//! the task attributes and a [`Next`] handle: calling `next.run()` continues down the
//! chain (ending in the proxy itself), not calling it short-circuits.
//!
//! ```text
//! MiddlewareStack [A, B]
//!   A.call(args, next) ──► B.call(args, next) ──► inner (proxy.perform)
//!        ▲ returns ◄──────────── returns ◄──────────── returns
//! ```
//!
//! ## Rules
//! - Order is registration order.
//! - Each `run` works on its own copy of the chain; pushing while tasks run does
//!   not affect them.
//! - Errors from inner code propagate through every middleware unchanged unless a
//!   middleware chooses to map them.

mod tracing_mw;

pub use tracing_mw::TracingMiddleware;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::attributes::Attributes;
use crate::error::BusError;

/// Wrapper around proxy execution.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Handles one task; call `next.run().await` to continue the chain.
    async fn call(&self, args: &Attributes, next: Next<'_>) -> Result<(), BusError>;
}

/// Shared handle to a middleware.
pub type MiddlewareRef = Arc<dyn Middleware>;

type Inner<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<(), BusError>> + Send + 'a>;

/// The rest of the chain after the current middleware.
pub struct Next<'a> {
    args: &'a Attributes,
    stack: &'a [MiddlewareRef],
    inner: Inner<'a>,
}

impl<'a> Next<'a> {
    fn new<F, Fut>(args: &'a Attributes, stack: &'a [MiddlewareRef], inner: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<(), BusError>> + Send + 'a,
    {
        let inner: Inner<'a> = Box::new(move || inner().boxed());
        Self { args, stack, inner }
    }

    /// Number of middlewares still ahead.
    pub fn remaining(&self) -> usize {
        self.stack.len()
    }

    /// Runs the next middleware, or the inner code once the chain is exhausted.
    pub fn run(self) -> BoxFuture<'a, Result<(), BusError>> {
        match self.stack.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    args: self.args,
                    stack: rest,
                    inner: self.inner,
                };
                head.call(self.args, next)
            }
            None => (self.inner)(),
        }
    }
}

/// Ordered list of middlewares.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    middlewares: Vec<MiddlewareRef>,
}

impl MiddlewareStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` to the end of the chain.
    pub fn push(&mut self, middleware: MiddlewareRef) {
        self.middlewares.push(middleware);
    }

    /// Number of registered middlewares.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// True when no middleware is registered.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs `inner` wrapped by every middleware, in registration order.
    pub async fn run<F, Fut>(&self, args: &Attributes, inner: F) -> Result<(), BusError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<(), BusError>> + Send,
    {
        let stack = self.middlewares.clone();
        Next::new(args, &stack, inner).run().await
    }
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("len", &self.middlewares.len())
            .finish()
    }
}
