//! chatcore — the real-time message fan-out core for a multi-tenant chat
//! platform (spec.md §1).

mod api;
mod auth;
mod bus;
mod config;
mod consumer;
mod dispatcher;
mod error;
mod hub;
mod metrics;
mod pubsub;
mod state;
mod store;
mod telemetry;

use std::sync::Arc;

use tracing::{error, info};

use crate::auth::JwtIssuer;
use crate::bus::{BusConsumer, BusProducer};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::hub::Registry;
use crate::pubsub::{PubSubPublisher, PubSubSubscriber};
use crate::state::AppState;
use crate::store::Store;

/// Resolves the configuration path from CLI arguments: `-c <path>`,
/// `--config <path>`, a bare path, or `config.toml` by default.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);

    match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {flag}");
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "config.toml".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = resolve_config_path();
    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("ERROR: failed to load config from {config_path}: {e}");
        e
    })?;

    telemetry::init_tracing(config.server.log_json);
    metrics::init();

    info!(
        instance_id = %config.server.instance_id,
        listen_addr = %config.server.listen_addr,
        "starting chatcore"
    );

    let store = Store::connect(&config.store.url, config.store.max_connections).await?;

    let bus_producer = BusProducer::new(&config.bus.brokers, &config.bus.topic)?;
    let bus_consumer = BusConsumer::new(
        &config.bus.brokers,
        &config.bus.topic,
        &config.bus.consumer_group_prefix,
        &config.server.instance_id,
    )?;

    let redis_client = redis::Client::open(config.pubsub.url.clone())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client.clone()).await?;
    let pubsub_publisher = PubSubPublisher::new(redis_conn, config.server.instance_id.clone());
    let pubsub_subscriber = PubSubSubscriber::new(redis_client, config.server.instance_id.clone());

    let registry = Arc::new(Registry::new());
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        bus_producer,
        pubsub_publisher,
        registry.clone(),
    ));
    let jwt = Arc::new(JwtIssuer::new(&config.auth.jwt_secret, config.auth.token_ttl_seconds));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    tokio::spawn(consumer::run_bus_consumer(bus_consumer, dispatcher.clone()));
    tokio::spawn(consumer::run_pubsub_subscriber(pubsub_subscriber, dispatcher.clone()));
    tokio::spawn(run_story_cleanup(store.clone(), shutdown_tx.subscribe()));

    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
            let _ = shutdown_tx.send(());
        });
    }

    let state = AppState {
        dispatcher,
        registry,
        jwt,
        hub_config: config.hub.clone(),
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr).await?;
    info!(addr = %config.server.listen_addr, "http/websocket server listening");

    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    Ok(())
}

/// Hourly cleanup of expired stories (spec.md §4.5), cancelled on shutdown.
async fn run_story_cleanup(store: Store, mut shutdown_rx: tokio::sync::broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match store.stories().delete_expired(chrono::Utc::now()).await {
                    Ok(removed) if removed > 0 => info!(removed, "cleaned up expired stories"),
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "story cleanup failed"),
                }
            }
            _ = shutdown_rx.recv() => {
                info!("story cleanup task shutting down");
                break;
            }
        }
    }
}
