//! # Tracing middleware.
//!
//! Opens a `bus.task` span around each task (proxy, event type, rider routing)
//! and logs how long it took and how it ended.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn, Instrument};

use super::{Middleware, Next};
use crate::attributes::{keys, stringify, Attributes};
use crate::error::BusError;

/// Logs every task the worker runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn call(&self, args: &Attributes, next: Next<'_>) -> Result<(), BusError> {
        let span = tracing::debug_span!(
            "bus.task",
            proxy = %stringify(args.get(keys::CLASS_PROXY)),
            event = %stringify(args.get(keys::EVENT_TYPE)),
            app_key = %stringify(args.get(keys::RIDER_APP_KEY)),
            sub_key = %stringify(args.get(keys::RIDER_SUB_KEY)),
        );
        let started = Instant::now();
        let res = next.run().instrument(span.clone()).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &res {
            Ok(()) => debug!(parent: &span, elapsed_ms, "task finished"),
            Err(e) => {
                warn!(parent: &span, elapsed_ms, label = e.as_label(), error = %e, "task failed")
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::middleware::MiddlewareStack;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_passes_result_through() {
        let mut stack = MiddlewareStack::new();
        stack.push(Arc::new(TracingMiddleware));
        let attrs = Attributes::new();
        assert!(stack.run(&attrs, || async { Ok(()) }).await.is_ok());
        let err = stack
            .run(&attrs, || async { Err::<(), BusError>(HandlerError::fatal("x").into()) })
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "bus_handler");
    }
}
