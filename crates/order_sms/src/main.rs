// Rust guideline compliant 2026-10-16

//! Order SMS bridge entry point.
//!
//! Listens for pending, not-yet-notified orders in Firestore, texts each new
//! one to the restaurant through Hubtel, then sets its `smsSent` flag. A
//! liveness route and an optional keep-alive self-ping run alongside.
//!
//! # Usage
//!
//! ```text
//! # Settings come from flags, the environment or a .env file
//! RUST_LOG=info cargo run -p order_sms
//!
//! # Per-order and per-poll debug output
//! RUST_LOG=debug cargo run -p order_sms
//! ```

mod adapters;
mod config;
mod keep_alive;
mod server;

use std::rc::Rc;
use std::time::Duration;

use adapters::firestore_store::FirestoreOrders;
use adapters::hubtel_gateway::HubtelGateway;
use anyhow::Context as _;
use clap::Parser as _;
use domain::OrderQuery;
use keep_alive::KeepAlive;
use listener::{ChangeListener, ListenerConfig};
use notifier::{Notifier, NotifierConfig};
use tokio::net::TcpListener;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // .env may set RUST_LOG, so it is read before the subscriber exists.
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    if let Err(e) = dotenv
        && !e.not_found()
    {
        tracing::warn!(error = %e, "main.dotenv.unreadable");
    }

    let settings = config::Settings::parse();

    // -- Firestore: feed + store share one client --
    let target = settings
        .firestore_target()
        .context("failed to resolve Firestore credentials")?;
    tracing::info!(?target, collection = %settings.collection, "main.firestore");
    let orders = FirestoreOrders::connect(
        &target,
        &settings.collection,
        Duration::from_secs(settings.poll_interval_secs),
    )
    .context("failed to load Firestore service account")?;

    // -- Notifier: Hubtel gateway --
    let mut notifier_config =
        NotifierConfig::builder(&settings.sender_id).currency(&settings.currency);
    if let Some(number) = &settings.alert_number {
        notifier_config = notifier_config.alert_number(number);
    }
    let notifier_config = notifier_config.build().context("failed to build notifier config")?;
    if notifier_config.alert_number.is_none() {
        tracing::warn!("main.config: no alert number, orders will be flagged without SMS");
    }
    let gateway = HubtelGateway::new(
        &settings.hubtel_endpoint,
        &settings.hubtel_client_id,
        &settings.hubtel_client_secret,
    );
    let notifier = Notifier::new(notifier_config, gateway);

    // -- Listener: pending && !smsSent, hourly refresh --
    let listener_config =
        ListenerConfig::builder(OrderQuery::pending_unnotified(&settings.collection))
            .build()
            .context("failed to build listener config")?;
    let mut order_listener =
        ChangeListener::new(listener_config, Rc::new(orders.clone()), Rc::new(notifier));

    let socket = TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("failed to bind port {}", settings.port))?;
    let keep_alive = settings.keep_alive_url.as_deref().map(KeepAlive::new);

    // Order tasks are spawn_local'ed: everything runs inside one LocalSet.
    let local = LocalSet::new();
    let result = local
        .run_until(async {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("main.shutdown: ctrl_c received");
                    Ok(())
                }
                () = order_listener.run(&orders) => Ok(()),
                served = server::serve(socket) => served.context("liveness server failed"),
                () = keep_alive::run_optional(keep_alive.as_ref()) => Ok(()),
            }
        })
        .await;

    order_listener.shutdown();
    result
}
