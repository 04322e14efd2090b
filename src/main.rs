use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use enterprise_api_rust::config::{self, LoggingConfig};
use enterprise_api_rust::database::{DatabaseManager, DocumentStore, MemoryStore, PgDocumentStore};
use enterprise_api_rust::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = config::config();
    let _guard = init_tracing(&config.logging);
    tracing::info!("Starting Enterprise API in {:?} mode", config.environment);

    let store = open_store().await?;
    let state = AppState::new(store.clone());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!(
        environment = config.environment.as_str(),
        store = store.backend(),
        "Enterprise API listening on http://{}",
        bind_addr
    );

    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    tracing::info!("Server shut down");
    Ok(())
}

/// Postgres when a database URL is configured, otherwise the in-memory store.
async fn open_store() -> anyhow::Result<Arc<dyn DocumentStore>> {
    let db = &config::config().database;
    match &db.url {
        Some(raw) => {
            let pool = DatabaseManager::connect(db).await.context("database connection failed")?;
            let name = DatabaseManager::validate_url(raw)
                .map(|u| DatabaseManager::database_name(&u))
                .unwrap_or_default();
            Ok(Arc::new(PgDocumentStore::new(pool, name)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// `LOG_LEVEL` (then `RUST_LOG`) filter; optionally also `{logging.dir}/server.log`.
fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(&logging.level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    if logging.to_file {
        let appender = tracing_appender::rolling::never(&logging.dir, "server.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        registry.with(fmt::layer().with_ansi(false).with_writer(writer)).init();
        Some(guard)
    } else {
        registry.init();
        None
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
