//! hearth-hq library - Heat Query service
//!
//! [HEARTH-HQ-NF-060]: Read-only companion to the heat engine. Serves
//! current momentum, projected score history and the tier table from the
//! shared database without ever writing to it.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;

pub mod api;
pub mod db;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (read-only)
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
///
/// [HEARTH-HQ-NF-040]: Health endpoint
/// Permissive CORS: the dashboard is served from a different origin.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/health", get(api::health_check))
        .route("/api/groups/:group_guid/momentum", get(api::get_momentum))
        .route(
            "/api/groups/:group_guid/momentum/history",
            get(api::get_history),
        )
        .route("/api/tiers", get(api::get_tiers))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
