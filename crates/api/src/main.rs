//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::seed::SeedData;
use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use domain::StaticAccessGate;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: DocumentStore + 'static>(
    store: Arc<S>,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let access = match &config.access_tokens {
        Some(entries) => StaticAccessGate::from_entries(entries).expect("invalid ACCESS_TOKENS"),
        None => {
            tracing::warn!("ACCESS_TOKENS not set, every authenticated route will answer 401");
            StaticAccessGate::new()
        }
    };
    tracing::info!(tokens = access.len().await, "access gate loaded");

    let state = api::create_default_state(store, Arc::new(access), config.lifecycle());

    if let Some(path) = &config.seed_path {
        let seed = SeedData::load(path).await.expect("failed to load seed file");
        seed.apply(&state).await.expect("failed to apply seed data");
    }

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    tracing::info!(
        enforce_prescription = config.enforce_prescription,
        assign_driver_resets_status = config.assign_driver_resets_status,
        "lifecycle configuration"
    );

    // 3. Pick the document store and serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresDocumentStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL document store");
            serve(Arc::new(store), &config, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory document store");
            serve(Arc::new(InMemoryDocumentStore::new()), &config, metrics_handle).await;
        }
    }
}
