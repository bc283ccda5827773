//! # Distributed minute clock.
//!
//! The heartbeat publishes one `heartbeat_minutes` event per wall-clock minute, no
//! matter how many processes run it or how often. A lease in the store elects one
//! runner at a time; a marker remembers the last minute published so a runner that
//! wakes up late backfills every missed minute in order.
//!
//! ## Keys
//! - `bus:heartbeat:lock`       lease deadline, epoch seconds
//! - `bus:heartbeat:timestamp`  last published epoch minute
//!
//! ## Rules
//! - Lease = `heartbeat_lock_seconds + heartbeat_lock_buffer`; the loop stops
//!   `heartbeat_lock_buffer` seconds before it expires.
//! - A lease may be taken over only once its deadline has passed.
//! - Minutes are published strictly increasing, one per loop iteration.
//! - In `development`/`test` the marker is clamped so at most
//!   `heartbeat_backfill_cap` minutes are replayed.
//! - The lease is always released after a pass that acquired it, even on error.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, TimeZone, Timelike, Utc};
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::attributes::Attributes;
use crate::core::Bus;
use crate::dispatch::HEARTBEAT_EVENT;
use crate::error::BusError;

/// Lease key.
pub const LOCK_KEY: &str = "bus:heartbeat:lock";
/// Last-published-minute key.
pub const MARKER_KEY: &str = "bus:heartbeat:timestamp";

/// One heartbeat runner bound to a bus.
#[derive(Clone, Copy)]
pub struct Heartbeat<'a> {
    bus: &'a Bus,
}

impl<'a> Heartbeat<'a> {
    /// Binds to `bus`.
    pub fn new(bus: &'a Bus) -> Self {
        Self { bus }
    }

    /// Tries to take the lease. Returns its deadline, or `None` when another runner holds it.
    pub async fn lock(&self) -> Result<Option<i64>, BusError> {
        let store = self.bus.store();
        let now = self.bus.now();
        let deadline = now + self.bus.config().heartbeat_lease();
        let deadline_text = deadline.to_string();

        if store.setnx(LOCK_KEY, &deadline_text).await? {
            return Ok(Some(deadline));
        }

        let current = parse_i64(store.get(LOCK_KEY).await?);
        if now <= current {
            return Ok(None);
        }

        let prior = parse_i64(store.getset(LOCK_KEY, &deadline_text).await?);
        if now > prior {
            Ok(Some(deadline))
        } else {
            Ok(None)
        }
    }

    /// Releases the lease.
    pub async fn unlock(&self) -> Result<(), BusError> {
        Ok(self.bus.store().del(LOCK_KEY).await?)
    }

    /// Last published epoch minute, clamped in development/test.
    pub async fn saved_minute(&self) -> Result<Option<i64>, BusError> {
        let Some(raw) = self.bus.store().get(MARKER_KEY).await? else {
            return Ok(None);
        };
        let mut minute = raw.trim().parse::<i64>().unwrap_or(0);
        if let Some(cap) = self.bus.config().backfill_cap() {
            let floor = self.bus.now().div_euclid(60) - cap;
            minute = minute.max(floor);
        }
        Ok(Some(minute))
    }

    /// Records `epoch_minute` as published.
    pub async fn save_minute(&self, epoch_minute: i64) -> Result<(), BusError> {
        Ok(self
            .bus
            .store()
            .set(MARKER_KEY, &epoch_minute.to_string())
            .await?)
    }

    /// One pass: take the lease, publish every missed minute, release the lease.
    ///
    /// Returns the number of minutes published (0 when the lease was held elsewhere).
    pub async fn perform(&self) -> Result<usize, BusError> {
        let Some(deadline) = self.lock().await? else {
            debug!("heartbeat lease held elsewhere");
            return Ok(0);
        };
        let run_until = deadline - self.bus.config().heartbeat_lock_buffer.max(0);

        let published = self.backfill(run_until).await;
        let released = self.unlock().await;
        let published = published?;
        released?;

        if published > 0 {
            info!(published, "heartbeat published minutes");
        }
        Ok(published)
    }

    async fn backfill(&self, run_until: i64) -> Result<usize, BusError> {
        let mut published = 0;
        loop {
            let now = self.bus.now();
            if now >= run_until {
                break;
            }
            let mut minutes = now.div_euclid(60);
            if let Some(last) = self.saved_minute().await? {
                if minutes <= last {
                    break;
                }
                minutes = last + 1;
            }

            self.bus
                .publish(HEARTBEAT_EVENT, minute_attributes(minutes))
                .await?;
            self.save_minute(minutes).await?;
            published += 1;
        }
        Ok(published)
    }
}

/// Attributes of the heartbeat event for `epoch_minutes` (calendar fields in UTC).
///
/// # Example
/// ```
/// use queuebus::heartbeat::minute_attributes;
///
/// // 2021-03-07 02:05 UTC, a Sunday
/// let attrs = minute_attributes(1_615_082_700 / 60);
/// assert_eq!(attrs["minute"], 5);
/// assert_eq!(attrs["hour"], 2);
/// assert_eq!(attrs["wday"], 0);
/// ```
pub fn minute_attributes(epoch_minutes: i64) -> Attributes {
    let seconds = epoch_minutes * 60;
    let mut attrs = Attributes::new();
    attrs.insert("epoch_seconds".into(), Value::from(seconds));
    attrs.insert("epoch_minutes".into(), Value::from(epoch_minutes));
    attrs.insert("epoch_hours".into(), Value::from(epoch_minutes.div_euclid(60)));
    attrs.insert("epoch_days".into(), Value::from(epoch_minutes.div_euclid(60 * 24)));

    if let Some(at) = Utc.timestamp_opt(seconds, 0).single() {
        attrs.insert("minute".into(), Value::from(at.minute()));
        attrs.insert("hour".into(), Value::from(at.hour()));
        attrs.insert("day".into(), Value::from(at.day()));
        attrs.insert("month".into(), Value::from(at.month()));
        attrs.insert("year".into(), Value::from(at.year()));
        attrs.insert("yday".into(), Value::from(at.ordinal()));
        attrs.insert("wday".into(), Value::from(at.weekday().num_days_from_sunday()));
    }
    attrs
}

/// Runs a heartbeat pass every `every` until `token` is cancelled.
///
/// Pass failures are logged and the loop continues.
pub async fn run(bus: Arc<Bus>, every: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => { break; }
            _ = ticker.tick() => {
                if let Err(e) = Heartbeat::new(&bus).perform().await {
                    warn!(label = e.as_label(), error = %e, "heartbeat pass failed");
                }
            }
        }
    }
    debug!("heartbeat loop stopped");
}

fn parse_i64(raw: Option<String>) -> i64 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}
