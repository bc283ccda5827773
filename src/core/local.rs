//! # Local mode.
//!
//! With a local mode active, `publish` never touches the incoming queue or the
//! persisted registry. Only subscriptions registered in this process are
//! considered.
//!
//! ## Modes
//! - `Suppress`   log and drop the event
//! - `Inline`     run every matching local handler in the publishing task
//! - `Standalone` enqueue one rider task per local match, skipping the driver
//!
//! The mode comes from [`BusConfig::local_mode`](crate::config::BusConfig), and can
//! be overridden for one future with [`Bus::with_local_mode`].

use std::future::Future;

use serde_json::Value;
use tracing::{debug, warn};

use super::bus::Bus;
use crate::attributes::{keys, stringify, Attributes};
use crate::config::LocalMode;
use crate::error::BusError;
use crate::proxies::rider_payload;

tokio::task_local! {
    static LOCAL_MODE: Option<LocalMode>;
}

impl Bus {
    /// Local mode in effect for the current task.
    pub fn local_mode(&self) -> Option<LocalMode> {
        LOCAL_MODE
            .try_with(|mode| *mode)
            .unwrap_or(self.cfg.local_mode)
    }

    /// Runs `fut` with `mode` as the local mode; `None` forces the queue path.
    pub async fn with_local_mode<F: Future>(&self, mode: Option<LocalMode>, fut: F) -> F::Output {
        LOCAL_MODE.scope(mode, fut).await
    }

    pub(super) async fn publish_local(
        &self,
        mode: LocalMode,
        attributes: Attributes,
    ) -> Result<(), BusError> {
        let event_type = stringify(attributes.get(keys::EVENT_TYPE));
        if mode == LocalMode::Suppress {
            warn!(event_type = %event_type, "local mode suppressed event");
            return Ok(());
        }

        let now = self.now();
        for hit in self.dispatchers.subscription_matches(&attributes).await {
            let sub = &hit.subscription;
            let mut payload = rider_payload(&attributes, &hit, now);
            debug!(
                mode = mode.as_label(),
                event_type = %event_type,
                app_key = %hit.app_key,
                sub_key = sub.key(),
                "local delivery"
            );
            match mode {
                LocalMode::Inline => {
                    payload.insert(keys::EXECUTED_AT.into(), Value::from(now));
                    sub.execute(payload).await?;
                }
                LocalMode::Standalone => {
                    self.enqueue_to(sub.queue_name(), sub.class_name(), payload)
                        .await?;
                }
                LocalMode::Suppress => {}
            }
        }
        Ok(())
    }
}
