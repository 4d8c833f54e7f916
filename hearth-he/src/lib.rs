//! hearth-he library - Heat Engine service
//!
//! Nightly batch that turns the completion ledger into momentum scores,
//! tiers, streaks and peaks, plus a small control API (health, manual
//! trigger, status, SSE event stream).

use axum::Router;
use batch::{BatchDriver, BatchSummary};
use hearth_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::{Arc, RwLock};

pub mod api;
pub mod backfill;
pub mod batch;
pub mod calculator;
pub mod db;
pub mod ledger;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: EventBus,
    pub driver: BatchDriver,
    /// Summary of the most recent run, for `/api/batch/status`
    pub last_summary: Arc<RwLock<Option<BatchSummary>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, events: EventBus) -> Self {
        let driver = BatchDriver::new(db.clone(), events.clone());
        Self {
            db,
            events,
            driver,
            last_summary: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", get(api::health))
        .route("/api/batch/run", post(api::run_batch))
        .route("/api/batch/status", get(api::batch_status))
        .route("/api/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
