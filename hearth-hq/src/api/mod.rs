//! Read API handlers for hearth-hq
//!
//! [HEARTH-HQ-F-010]: Current momentum per group
//! [HEARTH-HQ-F-020]: Trailing score history (replay projection)
//! [HEARTH-HQ-F-030]: Tier boundary table
//!
//! Reads are decoupled from the nightly batch: responses reflect whatever
//! the engine last persisted, and never surface per-group failure states.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use hearth_common::heat::{self, ReplayPoint};
use hearth_common::params::PARAMS;
use hearth_common::tiers::TierBand;
use hearth_common::Error;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;

/// Health check response [HEARTH-HQ-NF-040]
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
///
/// Does not require the database to be reachable.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "hearth-hq".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn error_response(e: Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

/// Momentum snapshot for one group [HEARTH-HQ-F-010]
#[derive(Debug, Serialize)]
pub struct MomentumResponse {
    pub group_guid: String,
    pub score: f64,
    pub tier: u8,
    pub tier_name: String,
    pub streak_days: i64,
    pub peak_score: f64,
    pub peak_date: Option<NaiveDate>,
    pub computed_for: Option<NaiveDate>,
    pub last_computed_at: Option<DateTime<Utc>>,
}

/// GET /api/groups/:group_guid/momentum
///
/// A group the engine has never scored gets the cold default (score 0,
/// tier 0), never an error.
pub async fn get_momentum(
    State(state): State<AppState>,
    Path(group_guid): Path<String>,
) -> Result<Json<MomentumResponse>, (StatusCode, Json<serde_json::Value>)> {
    let tiers = PARAMS.tiers();
    let stored = crate::db::load_state(&state.db, &group_guid)
        .await
        .map_err(error_response)?;

    let response = match stored {
        Some(s) => MomentumResponse {
            group_guid,
            score: s.score,
            tier: s.tier,
            tier_name: tiers.label(s.tier).to_string(),
            streak_days: s.streak_days,
            peak_score: s.peak_score,
            peak_date: s.peak_date,
            computed_for: s.computed_for,
            last_computed_at: Some(s.last_computed_at),
        },
        None => MomentumResponse {
            group_guid,
            score: 0.0,
            tier: 0,
            tier_name: tiers.label(0).to_string(),
            streak_days: 0,
            peak_score: 0.0,
            peak_date: None,
            computed_for: None,
            last_computed_at: None,
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    /// Trailing entries requested; clamped to `heat_history_cap`
    pub days: Option<u32>,
}

/// History response [HEARTH-HQ-F-020]
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub group_guid: String,
    pub days: usize,
    pub history: Vec<ReplayPoint>,
}

/// GET /api/groups/:group_guid/momentum/history?days=N
///
/// Scores are not persisted day-by-day, so the series is derived by
/// replaying the update rule over the stored rates from the start of
/// stored history, then truncated to the trailing `min(N, cap)` entries.
pub async fn get_history(
    State(state): State<AppState>,
    Path(group_guid): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, (StatusCode, Json<serde_json::Value>)> {
    let cap = *PARAMS.history_cap.read().unwrap();
    let requested = query.days.unwrap_or(cap).min(cap) as usize;

    let series = crate::db::rates_ascending(&state.db, &group_guid)
        .await
        .map_err(error_response)?;

    let tuning = PARAMS.tuning();
    let tiers = PARAMS.tiers();
    let window_days = *PARAMS.baseline_window_days.read().unwrap();
    let points = heat::replay(&group_guid, &series, window_days, &tuning, &tiers)
        .map_err(error_response)?;

    let tail_start = points.len().saturating_sub(requested);
    let history = points[tail_start..].to_vec();
    Ok(Json(HistoryResponse {
        group_guid,
        days: history.len(),
        history,
    }))
}

/// Tier table response [HEARTH-HQ-F-030]
#[derive(Debug, Serialize)]
pub struct TiersResponse {
    pub tiers: Vec<TierBand>,
}

/// GET /api/tiers
pub async fn get_tiers() -> Json<TiersResponse> {
    Json(TiersResponse {
        tiers: PARAMS.tiers().bands().to_vec(),
    })
}
