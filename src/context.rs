//! # Per-execution ambient context.
//!
//! Events may carry a locale and timezone (`bus_locale`, `bus_timezone`). When a
//! subscription runs, those values become the [`ExecutionContext`] of that run:
//! the handler receives it explicitly, and it is also installed as a tokio
//! task-local for the duration of the handler future so that nested `publish`
//! calls stamp the same locale/timezone onto the events they emit.
//!
//! ## Rules
//! - The scope is bound to one future; it is restored when the future completes
//!   (or is dropped), so concurrent executions never see each other's context.
//! - Values present on the event override the enclosing context; absent values
//!   inherit it.
//! - The bus treats both values as opaque strings.

use std::future::Future;

use crate::attributes::{keys, non_empty, Attributes};

tokio::task_local! {
    static CURRENT: ExecutionContext;
}

/// Locale/timezone hints traveling with an event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Locale identifier, e.g. `"en"`.
    pub locale: Option<String>,
    /// Timezone name, e.g. `"PST"`.
    pub timezone: Option<String>,
}

impl ExecutionContext {
    /// Creates a context from explicit values.
    pub fn new(locale: Option<String>, timezone: Option<String>) -> Self {
        Self { locale, timezone }
    }

    /// Reads `bus_locale` / `bus_timezone` from an attribute map.
    pub fn from_attributes(attributes: &Attributes) -> Self {
        Self {
            locale: non_empty(attributes, keys::LOCALE),
            timezone: non_empty(attributes, keys::TIMEZONE),
        }
    }

    /// Returns the context installed for the current task, if any.
    pub fn current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Returns `self` with every value present in `other` replacing its own.
    pub fn overlay(mut self, other: Self) -> Self {
        if other.locale.is_some() {
            self.locale = other.locale;
        }
        if other.timezone.is_some() {
            self.timezone = other.timezone;
        }
        self
    }

    /// True when neither locale nor timezone is set.
    pub fn is_empty(&self) -> bool {
        self.locale.is_none() && self.timezone.is_none()
    }

    /// Runs `fut` with `self` installed as the current context.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_attributes_reads_reserved_keys() {
        let mut attrs = Attributes::new();
        attrs.insert(keys::LOCALE.into(), json!("en"));
        attrs.insert(keys::TIMEZONE.into(), json!(""));
        let ctx = ExecutionContext::from_attributes(&attrs);
        assert_eq!(ctx.locale.as_deref(), Some("en"));
        assert_eq!(ctx.timezone, None);
    }

    #[test]
    fn test_overlay_keeps_outer_values_when_absent() {
        let outer = ExecutionContext::new(Some("jp".into()), Some("EST".into()));
        let inner = ExecutionContext::new(Some("en".into()), None);
        let merged = outer.overlay(inner);
        assert_eq!(merged.locale.as_deref(), Some("en"));
        assert_eq!(merged.timezone.as_deref(), Some("EST"));
    }

    #[tokio::test]
    async fn test_scope_restores_on_exit() {
        assert_eq!(ExecutionContext::current(), None);
        let ctx = ExecutionContext::new(Some("en".into()), Some("PST".into()));
        let seen = ctx
            .clone()
            .scope(async {
                let nested = ExecutionContext::new(None, Some("UTC".into()));
                let inner = nested
                    .scope(async { ExecutionContext::current() })
                    .await;
                assert_eq!(inner.and_then(|c| c.timezone).as_deref(), Some("UTC"));
                ExecutionContext::current()
            })
            .await;
        assert_eq!(seen, Some(ctx));
        assert_eq!(ExecutionContext::current(), None);
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let a = ExecutionContext::new(Some("en".into()), None).scope(async {
            tokio::task::yield_now().await;
            ExecutionContext::current()
        });
        let b = ExecutionContext::new(Some("fr".into()), None).scope(async {
            tokio::task::yield_now().await;
            ExecutionContext::current()
        });
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.and_then(|c| c.locale).as_deref(), Some("en"));
        assert_eq!(b.and_then(|c| c.locale).as_deref(), Some("fr"));
    }
}
