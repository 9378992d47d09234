use customer_360_api::config::{Config, StoreBackend};
use customer_360_api::db::Database;
use customer_360_api::db_storage::PgDocumentStore;
use customer_360_api::gateway::DocumentStore;
use customer_360_api::handlers::{self, AppState};
use customer_360_api::memory_store::MemoryDocumentStore;

use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - The document store (PostgreSQL pool or seeded in-memory store).
/// - HTTP routes and middleware (CORS, body limit, rate limiting).
///
/// It then starts the Axum server and closes the store once the server
/// has shut down.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "customer_360_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Open the document store; the caller owns its lifecycle
    let (store, database): (Arc<dyn DocumentStore>, Option<Database>) = match config.store_backend
    {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DB_URL is required for the postgres backend"))?;
            let db = Database::new(url, config.db_max_connections).await?;
            tracing::info!("Database connection pool established");
            let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(db.pool.clone()));
            (store, Some(db))
        }
        StoreBackend::Memory => {
            let store = match config.seed_file {
                Some(ref path) => MemoryDocumentStore::load_seed_file(path).await?,
                None => MemoryDocumentStore::new(),
            };
            tracing::warn!("Using in-memory document store");
            let store: Arc<dyn DocumentStore> = Arc::new(store);
            (store, None)
        }
    };

    store
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Document store not ready: {}", e))?;
    tracing::info!("✓ Document store ready");

    let app_state = Arc::new(AppState::new(store, config.aggregator_settings()));

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let app = handlers::router(app_state).layer(
        ServiceBuilder::new()
            // Request size limit: 1MB max payload
            .layer(RequestBodyLimitLayer::new(1024 * 1024))
            // Rate limiting: 10 req/sec per IP, burst of 20
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Server listening on {}", addr);
    tracing::info!("📍 API endpoint: http://localhost:{}/api/v1/customers", config.port);
    tracing::info!("💊 Health check: http://localhost:{}/api/v1/health", config.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(db) = database {
        db.close().await;
        tracing::info!("Database connection pool closed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
