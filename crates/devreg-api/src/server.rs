//! HTTP server: shared state, router and serve loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::ngsi::ContextRegistry;

/// Maximum accepted request body size (1 MiB).
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

/// State shared by every handler.
#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<ContextRegistry>,
    /// Unix timestamp of server start.
    pub started_at: i64,
}

impl ServerState {
    pub fn new(registry: ContextRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Create the application router.
pub fn create_router(state: ServerState) -> Router {
    let entities = handlers::ENTITIES_PATH;

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            entities,
            get(handlers::query_entities_handler).post(handlers::create_entity_handler),
        )
        .route(
            &format!("{entities}/:entity"),
            get(handlers::retrieve_entity_handler),
        )
        .route(
            &format!("{entities}/:entity/attrs"),
            patch(handlers::update_entity_attributes_handler),
        )
        .route(
            &format!("{entities}/:entity/attrs/"),
            patch(handlers::update_entity_attributes_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_SIZE))
        // Any origin, credentials allowed
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Serve until a shutdown signal arrives.
pub async fn run(bind: SocketAddr, state: ServerState) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    tracing::info!("Starting device registry on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
