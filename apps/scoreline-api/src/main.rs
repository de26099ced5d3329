use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use scoreline_common::id::{prefix, prefixed_ulid};
use scoreline_common::SnowflakeGenerator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scoreline_api::config::Config;
use scoreline_api::db::kv::{KeyValueStore, MemoryStore, RedisStore};
use scoreline_api::hub::BroadcastHub;
use scoreline_api::relay::{RedisRelay, RelayLink};
use scoreline_api::scoring::Coordinator;
use scoreline_api::store::PgStore;
use scoreline_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let pool = scoreline_api::db::pool::connect(&config.database_url, config.db_pool_size).await;
    let store = Arc::new(PgStore::new(pool));
    let snowflake = Arc::new(SnowflakeGenerator::new(config.worker_id));

    let kv: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisStore::connect(url)
                .await
                .expect("failed to connect to redis"),
        ),
        None => {
            tracing::warn!("REDIS_URL not set, tokens are read from an in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let hub = BroadcastHub::start(config.hub.clone());

    let (relay, consumers) = match &config.redis_url {
        Some(url) => {
            let broker = RedisRelay::connect(url)
                .await
                .expect("failed to connect relay to redis");
            let link = RelayLink::new(
                Arc::new(broker),
                prefixed_ulid(prefix::PROCESS),
                config.relay_queue_prefix.clone(),
            );
            let consumers = link
                .spawn_consumers(hub.clone())
                .await
                .expect("failed to subscribe to relay queues");
            tracing::info!(origin = %link.origin(), prefix = %config.relay_queue_prefix, "relay enabled");
            (Some(Arc::new(link)), consumers)
        }
        None => (None, Vec::new()),
    };

    tracing::info!(worker_id = config.worker_id, "scoreline-api configured");

    let state = AppState {
        kv,
        chat: store.clone(),
        config: Arc::new(config),
        snowflake: snowflake.clone(),
        coordinator: Arc::new(Coordinator::new(store, snowflake)),
        hub: hub.clone(),
        relay,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(scoreline_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "scoreline-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    for consumer in consumers {
        consumer.abort();
    }
    hub.shutdown().await;
    tracing::info!("scoreline-api stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
