//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use checkout::{HttpPaymentGateway, InMemoryPaymentGateway, PaymentGateway};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DATABASE_MAX_CONNECTIONS: u32 = 10;

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

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn payment_gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    match &config.gateway_secret_key {
        Some(secret) => {
            tracing::info!(url = %config.gateway_url, "using HTTP payment gateway");
            Arc::new(HttpPaymentGateway::new(config.gateway_url.clone(), secret))
        }
        None => {
            tracing::warn!("PAYMENT_SECRET_KEY not set, payments are simulated in memory");
            Arc::new(InMemoryPaymentGateway::new())
        }
    }
}

async fn serve<S: EventStore + Clone + 'static>(
    event_store: S,
    config: Config,
    metrics_handle: PrometheusHandle,
) {
    let checkout_config = checkout::CheckoutConfig::default()
        .with_max_commit_attempts(config.max_commit_attempts);
    let state = api::create_state(event_store, payment_gateway(&config), checkout_config);

    // Replay existing events into the read models
    let replayed = state.catch_up().await.expect("catch-up failed");
    tracing::info!(events = replayed, "read models caught up");

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
    dotenvy::dotenv().ok();

    let config = Config::from_env().expect("invalid configuration");
    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresEventStore::connect(&url, DATABASE_MAX_CONNECTIONS)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL event store");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, events are kept in memory");
            serve(InMemoryEventStore::new(), config, metrics_handle).await;
        }
    }
}
