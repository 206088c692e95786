//! Geobase server library logic.

pub mod api_ws;
pub mod config;
pub mod dispatch;
pub mod outbox;
pub mod subscriber;

use axum::{routing::get, Extension, Json, Router};
use config::{Config, ConnectionConfig};
use geobase_store::GeoStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live objects and subscriptions.
    pub store: GeoStore,
    /// Connection manager for WebSockets.
    pub connection_manager: api_ws::ConnectionManager,
    /// Per-connection settings.
    pub connection: ConnectionConfig,
    /// Directory for static files served as the fallback.
    pub public_dir: String,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            store: GeoStore::new(),
            connection_manager: api_ws::ConnectionManager::new(),
            connection: config.connection.clone(),
            public_dir: config.static_files.dir.clone(),
        }
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Liveness probe kept for existing clients.
async fn hello() -> &'static str {
    "Hello"
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/hello", get(hello))
        .route("/events", get(api_ws::ws_handler));

    let public_dir = state.public_dir.clone();
    let router = if std::path::Path::new(&public_dir).is_dir() {
        tracing::info!(path = %public_dir, "serving static files");
        router.fallback_service(ServeDir::new(&public_dir))
    } else {
        tracing::info!(
            path = %public_dir,
            "static directory not found, skipping static file serving"
        );
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
