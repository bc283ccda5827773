//! # Example: Publish / Subscribe Round Trip
//!
//! One process plays both sides: it registers two namespaces, persists them,
//! publishes a few events and runs a tiny worker loop over the in-memory queues.
//! A heartbeat loop runs alongside and a heartbeat subscriber prints every minute.
//!
//! Run with `RUST_LOG=queuebus=debug cargo run --example round_trip`.

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use queuebus::{
    heartbeat, Attributes, BusBuilder, BusConfig, ExecutionContext, HandlerError, HandlerFn,
    HeartbeatSchedule, Matcher, Special, StoreQueue, TracingMiddleware, Worker,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let bus = BusBuilder::new(BusConfig::from_env())
        .with_middleware(std::sync::Arc::new(TracingMiddleware))
        .build();

    bus.dispatch(Some("mailer"), |app| {
        app.subscribe(
            "user_created",
            None,
            HandlerFn::arc(|ctx: ExecutionContext, attrs: Attributes| async move {
                println!("[mailer] welcome mail to {} (locale {:?})", attrs["email"], ctx.locale);
                Ok(())
            }),
        )?;
        app.on_heartbeat(
            "tick",
            HeartbeatSchedule::every_minute(),
            HandlerFn::arc(|_ctx: ExecutionContext, attrs: Attributes| async move {
                println!("[mailer] heartbeat {}:{}", attrs["hour"], attrs["minute"]);
                Ok(())
            }),
        )?;
        Ok(())
    })
    .await?;

    bus.dispatch(Some("audit"), |app| {
        let any_user_event = Matcher::new()
            .with("bus_event_type", "user_.*")
            .with("email", Special::Present);
        app.dispatch_event(
            "slow",
            "user_events",
            Some(any_user_event),
            HandlerFn::arc(|_ctx: ExecutionContext, attrs: Attributes| async move {
                if attrs["email"] == "reject@example.com" {
                    return Err(HandlerError::fatal("rejected address"));
                }
                println!("[audit] {} {}", attrs["bus_event_type"], attrs["email"]);
                Ok(())
            }),
        )?;
        Ok(())
    })
    .await?;

    let persisted = bus.subscribe_all().await?;
    println!("persisted {persisted} subscriptions, queues: {:?}", bus.queue_names().await);

    let token = CancellationToken::new();
    let ticker = tokio::spawn(heartbeat::run(
        bus.clone(),
        Duration::from_millis(200),
        token.clone(),
    ));

    for (event, email, locale) in [
        ("user_created", "ada@example.com", "en"),
        ("user_deleted", "bob@example.com", "fr"),
        ("user_created", "reject@example.com", "de"),
    ] {
        let attrs = json!({"email": email, "bus_locale": locale});
        bus.publish(event, attrs.as_object().cloned().unwrap_or_default())
            .await?;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    let queue = StoreQueue::new(bus.store().clone());
    let mut names = vec![bus.config().incoming_queue.clone()];
    names.extend(bus.queue_names().await);
    for name in &names {
        while let Some(task) = queue.pop(name).await? {
            match Worker::perform_envelope(&bus, &task).await {
                Ok(outcome) => println!("[worker:{name}] {}", outcome.as_label()),
                Err(e) => println!("[worker:{name}] failed: {}", e.as_message()),
            }
        }
    }

    token.cancel();
    ticker.await?;
    Ok(())
}
