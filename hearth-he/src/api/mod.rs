//! Control API handlers for hearth-he
//!
//! The engine is driven by an external scheduler (cron or systemd timer)
//! hitting `/api/batch/run`; `/api/events` streams progress and tier
//! transitions to the notification collaborator.

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::Stream;
use hearth_common::time;
use hearth_common::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::info;

/// Health endpoint (no auth)
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "hearth-he",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct RunRequest {
    /// Target date `YYYY-MM-DD`; defaults to today UTC (scoring yesterday)
    pub date: Option<String>,
}

fn error_response(e: Error) -> (StatusCode, Json<Value>) {
    let status = match &e {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

/// Trigger a batch run for a target date
pub async fn run_batch(
    State(state): State<AppState>,
    body: Option<Json<RunRequest>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let target_date = match request.date {
        Some(s) => time::parse_date(&s).map_err(error_response)?,
        None => time::default_target_date(),
    };

    info!("Batch run requested for {}", target_date);
    let summary = state
        .driver
        .run(target_date)
        .await
        .map_err(error_response)?;

    *state.last_summary.write().unwrap() = Some(summary.clone());
    Ok(Json(json!({ "summary": summary })))
}

/// Last run summary (None until a run has happened this process)
pub async fn batch_status(State(state): State<AppState>) -> Json<Value> {
    let summary = state.last_summary.read().unwrap().clone();
    Json(json!({ "last_run": summary }))
}

/// SSE stream of engine events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    hearth_common::sse::create_event_sse_stream(&state.events, "hearth-he")
}
