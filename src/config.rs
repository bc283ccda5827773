//! # Bus configuration.
//!
//! Provides [`BusConfig`], built once and shared by `Arc` through the [`Bus`](crate::Bus).
//!
//! Config is used in three places:
//! 1. **Publishing**: incoming queue, hostname, context blob, local mode, `before_publish`
//! 2. **Registration**: default namespace and queue for `Dispatchers::dispatch(None, ..)`
//! 3. **Heartbeat**: lock lease/buffer and the development backfill cap
//!
//! ## Sentinel values
//! - `default_app_key = None` → registering without a namespace is an `InvalidAppKey`
//! - `local_mode = None` → events go through the queue
//! - `heartbeat_backfill_cap = 0` → never clamp the heartbeat marker

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::attributes::Attributes;

/// Callback run on every outgoing event after metadata stamping.
pub type BeforePublish = Arc<dyn Fn(&mut Attributes) + Send + Sync>;

/// How `publish` behaves when no queue round trip is wanted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalMode {
    /// Run matching local subscriptions directly, in the publishing task.
    Inline,
    /// Enqueue rider tasks for local matches only, skipping the driver.
    Standalone,
    /// Log and drop the event.
    Suppress,
}

impl LocalMode {
    /// Parses `inline`, `standalone` or `suppress` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(LocalMode::Inline),
            "standalone" => Some(LocalMode::Standalone),
            "suppress" => Some(LocalMode::Suppress),
            _ => None,
        }
    }

    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LocalMode::Inline => "inline",
            LocalMode::Standalone => "standalone",
            LocalMode::Suppress => "suppress",
        }
    }
}

/// Process-wide configuration for the bus.
///
/// ## Field semantics
/// - `incoming_queue`: queue receiving driver tasks (`bus_incoming`)
/// - `default_app_key`: namespace used when registration names none
/// - `default_queue`: queue used by `Dispatch::subscribe`
/// - `hostname`: stamped into `bus_app_hostname`
/// - `environment`: `development`/`test` enable the heartbeat backfill cap
/// - `heartbeat_lock_seconds` / `heartbeat_lock_buffer`: heartbeat lease, seconds
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking sentinels inline.
#[derive(Clone)]
pub struct BusConfig {
    /// Queue that receives freshly published events.
    pub incoming_queue: String,

    /// Namespace used when `Dispatchers::dispatch` is called without one.
    pub default_app_key: Option<String>,

    /// Queue name used by `Dispatch::subscribe`.
    pub default_queue: String,

    /// Host name stamped on published events.
    pub hostname: String,

    /// Deployment environment, e.g. `production`, `development`, `test`.
    pub environment: Option<String>,

    /// Local publishing mode; `None` routes through the queue.
    pub local_mode: Option<LocalMode>,

    /// Opaque blob stamped into `bus_context`.
    pub context: Option<Value>,

    /// Heartbeat lock lease, seconds.
    pub heartbeat_lock_seconds: i64,

    /// Safety margin kept free at the end of the heartbeat lease, seconds.
    pub heartbeat_lock_buffer: i64,

    /// Maximum minutes the heartbeat backfills in development/test (`0` = no cap).
    pub heartbeat_backfill_cap: i64,

    /// Runs on every outgoing event after metadata stamping.
    pub before_publish: Option<BeforePublish>,
}

impl BusConfig {
    /// Reads overrides from the environment on top of [`BusConfig::default`].
    ///
    /// - `BUS_ENV`, then `RAILS_ENV`, then `RACK_ENV` → `environment`
    /// - `BUS_INCOMING_QUEUE` → `incoming_queue`
    /// - `BUS_APP_KEY` → `default_app_key`
    /// - `BUS_LOCAL_MODE` → `local_mode`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.environment = ["BUS_ENV", "RAILS_ENV", "RACK_ENV"]
            .iter()
            .find_map(|name| env_non_empty(name));
        if let Some(queue) = env_non_empty("BUS_INCOMING_QUEUE") {
            cfg.incoming_queue = queue;
        }
        if let Some(app) = env_non_empty("BUS_APP_KEY") {
            cfg.default_app_key = Some(app);
        }
        cfg.local_mode = env_non_empty("BUS_LOCAL_MODE").and_then(|m| LocalMode::parse(&m));
        cfg
    }

    /// True in `development` and `test` environments.
    #[inline]
    pub fn is_development(&self) -> bool {
        matches!(
            self.environment.as_deref(),
            Some("development") | Some("test")
        )
    }

    /// Returns the heartbeat backfill cap in minutes, if it applies.
    ///
    /// - `None` → production, or cap disabled with `0`
    /// - `Some(n)` → marker is clamped to at most `n` minutes behind now
    #[inline]
    pub fn backfill_cap(&self) -> Option<i64> {
        if self.is_development() && self.heartbeat_backfill_cap > 0 {
            Some(self.heartbeat_backfill_cap)
        } else {
            None
        }
    }

    /// Full heartbeat lease including the buffer, seconds.
    #[inline]
    pub fn heartbeat_lease(&self) -> i64 {
        self.heartbeat_lock_seconds.max(0) + self.heartbeat_lock_buffer.max(0)
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `incoming_queue = "bus_incoming"`
    /// - `default_queue = "default"`
    /// - `hostname` = the machine host name, `localhost` if unavailable
    /// - heartbeat lease `60s` + `2s` buffer, backfill cap `3` minutes
    fn default() -> Self {
        Self {
            incoming_queue: "bus_incoming".to_string(),
            default_app_key: None,
            default_queue: "default".to_string(),
            hostname: local_hostname(),
            environment: None,
            local_mode: None,
            context: None,
            heartbeat_lock_seconds: 60,
            heartbeat_lock_buffer: 2,
            heartbeat_backfill_cap: 3,
            before_publish: None,
        }
    }
}

impl fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConfig")
            .field("incoming_queue", &self.incoming_queue)
            .field("default_app_key", &self.default_app_key)
            .field("default_queue", &self.default_queue)
            .field("hostname", &self.hostname)
            .field("environment", &self.environment)
            .field("local_mode", &self.local_mode)
            .field("context", &self.context)
            .field("heartbeat_lock_seconds", &self.heartbeat_lock_seconds)
            .field("heartbeat_lock_buffer", &self.heartbeat_lock_buffer)
            .field("heartbeat_backfill_cap", &self.heartbeat_backfill_cap)
            .field("before_publish", &self.before_publish.is_some())
            .finish()
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
