//! classifieds-gateway server entry point.
//!
//! Starts the Axum HTTP server with the REST endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use classifieds_gateway::api::{self, UploadRoutes};
use classifieds_gateway::app_state::AppState;
use classifieds_gateway::auth::TokenVerifier;
use classifieds_gateway::config::{GatewayConfig, LogFormat, StoreBackend};
use classifieds_gateway::geo::{GeoResolver, MaxMindGeoResolver, NullGeoResolver};
use classifieds_gateway::persistence::{MemoryStore, PostgresStore, Store};
use classifieds_gateway::service::{PremiumService, ViewService};
use classifieds_gateway::storage::LocalDiskStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, backend = ?config.store_backend, "starting classifieds-gateway");

    // Build persistence layer
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(&config).await?;
            if config.run_migrations {
                store.migrate().await?;
                tracing::info!("database migrations applied");
            }
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Build collaborators
    let geo: Arc<dyn GeoResolver> = match &config.geoip_database_path {
        Some(path) => {
            let resolver = MaxMindGeoResolver::from_path(path)?;
            tracing::info!(database = resolver.database_type(), path = %path.display(), "geo database loaded");
            Arc::new(resolver)
        }
        None => Arc::new(NullGeoResolver),
    };
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let storage = Arc::new(LocalDiskStorage::new(
        config.upload_dir.clone(),
        config.upload_public_base_url.clone(),
    ));

    // Build service layer
    let view_service = Arc::new(ViewService::new(
        Arc::clone(&store),
        geo,
        config.view_windows,
    ));
    let premium_service = Arc::new(PremiumService::new(store, storage));

    // Build application state
    let app_state = AppState {
        view_service,
        premium_service,
        tokens: Arc::new(TokenVerifier::new(&config.jwt_secret)),
    };

    // Build router
    let uploads = UploadRoutes {
        dir: config.upload_dir.clone(),
        public_base_url: config.upload_public_base_url.clone(),
        max_bytes: config.upload_max_bytes,
    };
    let app = api::with_middleware(
        api::build_router(&uploads),
        Duration::from_secs(config.request_timeout_secs),
    )
    .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
