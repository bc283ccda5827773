//! # Heartbeat subscriptions.
//!
//! [`HeartbeatSchedule`] describes which `heartbeat_minutes` events a subscriber
//! wants. Exact fields (`minute`, `hour`, `wday`) go into the matcher; intervals are
//! checked when the event runs, by [`HeartbeatGate`] wrapping the real handler.
//!
//! ```text
//! minute_interval = 15  → fires at :00 :15 :30 :45
//! hour_interval   = 2   → fires on even hours
//! minute = 5, hour = 3  → fires once a day at 03:05 UTC
//! ```

use async_trait::async_trait;

use crate::attributes::{as_int, keys, Attributes};
use crate::context::ExecutionContext;
use crate::error::{BusError, HandlerError};
use crate::matcher::Matcher;
use crate::subscriptions::{Handler, HandlerRef};

/// Event type emitted by the heartbeat once per minute.
pub const HEARTBEAT_EVENT: &str = "heartbeat_minutes";

/// Which heartbeat minutes a subscriber wants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeartbeatSchedule {
    /// Exact minute of the hour (0..=59).
    pub minute: Option<i64>,
    /// Exact hour of the day (0..=23).
    pub hour: Option<i64>,
    /// Exact day of the week, Sunday = 0.
    pub wday: Option<i64>,
    /// Fire only when `minute % minute_interval == 0`.
    pub minute_interval: Option<i64>,
    /// Fire only when `hour % hour_interval == 0`.
    pub hour_interval: Option<i64>,
}

impl HeartbeatSchedule {
    /// Every minute.
    pub fn every_minute() -> Self {
        Self::default()
    }

    /// Sets the exact minute.
    pub fn minute(mut self, minute: i64) -> Self {
        self.minute = Some(minute);
        self
    }

    /// Sets the exact hour.
    pub fn hour(mut self, hour: i64) -> Self {
        self.hour = Some(hour);
        self
    }

    /// Sets the exact day of the week.
    pub fn wday(mut self, wday: i64) -> Self {
        self.wday = Some(wday);
        self
    }

    /// Sets the minute interval.
    pub fn minute_interval(mut self, every: i64) -> Self {
        self.minute_interval = Some(every);
        self
    }

    /// Sets the hour interval.
    pub fn hour_interval(mut self, every: i64) -> Self {
        self.hour_interval = Some(every);
        self
    }

    /// Rejects negative exact fields and non-positive intervals.
    pub fn validate(&self) -> Result<(), BusError> {
        for (name, value) in [("minute", self.minute), ("hour", self.hour), ("wday", self.wday)] {
            if matches!(value, Some(v) if v < 0) {
                return Err(BusError::invalid_argument(format!(
                    "{name} must be a non-negative integer"
                )));
            }
        }
        for (name, value) in [
            ("minute_interval", self.minute_interval),
            ("hour_interval", self.hour_interval),
        ] {
            if matches!(value, Some(v) if v <= 0) {
                return Err(BusError::invalid_argument(format!(
                    "{name} must be a positive integer"
                )));
            }
        }
        Ok(())
    }

    /// Matcher on the event type plus every exact field.
    pub fn matcher(&self) -> Matcher {
        let mut m = Matcher::event_type(HEARTBEAT_EVENT);
        for (name, value) in [("minute", self.minute), ("hour", self.hour), ("wday", self.wday)] {
            if let Some(v) = value {
                m.insert(name, v.to_string());
            }
        }
        m
    }

    /// True when both intervals accept the event.
    ///
    /// A configured interval whose field is missing or not an integer rejects.
    pub fn accepts(&self, attributes: &Attributes) -> bool {
        fn on_interval(every: Option<i64>, value: Option<i64>) -> bool {
            match (every, value) {
                (None, _) => true,
                (Some(every), Some(v)) => v % every == 0,
                (Some(_), None) => false,
            }
        }
        on_interval(self.minute_interval, as_int(attributes.get("minute")))
            && on_interval(self.hour_interval, as_int(attributes.get("hour")))
    }
}

/// Handler that runs `inner` only when the schedule's intervals accept the event.
pub struct HeartbeatGate {
    schedule: HeartbeatSchedule,
    inner: HandlerRef,
}

impl HeartbeatGate {
    /// Wraps `inner`.
    pub fn new(schedule: HeartbeatSchedule, inner: HandlerRef) -> Self {
        Self { schedule, inner }
    }
}

#[async_trait]
impl Handler for HeartbeatGate {
    async fn call(&self, ctx: ExecutionContext, attributes: Attributes) -> Result<(), HandlerError> {
        if !self.schedule.accepts(&attributes) {
            tracing::trace!(
                event = ?attributes.get(keys::EVENT_TYPE),
                "heartbeat outside interval"
            );
            return Ok(());
        }
        self.inner.call(ctx, attributes).await
    }
}
