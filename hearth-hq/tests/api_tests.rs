//! Integration tests for hearth-hq API endpoints
//!
//! Tests cover:
//! - [HEARTH-HQ-F-010] Current momentum, including the cold default
//! - [HEARTH-HQ-F-020] History projection with the `days` clamp
//! - [HEARTH-HQ-F-030] Tier boundary table
//! - [HEARTH-HQ-NF-040] Health endpoint
//!
//! The handlers only read, so tests seed through an ordinary writable
//! pool from `init_database` rather than a second read-only connection.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use hearth_hq::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot` method

async fn setup_test_db() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = hearth_common::db::init_database(&dir.path().join("hearth.db"))
        .await
        .expect("init database");
    (dir, pool)
}

fn setup_app(db: SqlitePool) -> axum::Router {
    build_router(AppState::new(db))
}

fn test_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn seed_state(pool: &SqlitePool, guid: &str, score: f64, tier: u8, streak: i64, peak: f64) {
    sqlx::query(
        "INSERT INTO momentum_state \
         (group_guid, score, tier, streak_days, peak_score, peak_date, computed_for, last_computed_at) \
         VALUES (?, ?, ?, ?, ?, '2026-03-10', '2026-03-11', ?)",
    )
    .bind(guid)
    .bind(score)
    .bind(tier as i64)
    .bind(streak)
    .bind(peak)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_rate(pool: &SqlitePool, guid: &str, day: &str, rate: Option<f64>) {
    sqlx::query(
        "INSERT INTO daily_rates \
         (group_guid, date, eligible_pairs, completed_pairs, rate, member_count, commitment_count, computed_at) \
         VALUES (?, ?, 2, 1, ?, 2, 1, ?)",
    )
    .bind(guid)
    .bind(day)
    .bind(rate)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn health_endpoint_reports_module() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let response = app.oneshot(test_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "hearth-hq");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn momentum_returns_stored_state_with_tier_name() {
    let (_dir, db) = setup_test_db().await;
    seed_state(&db, "g1", 60.0, 4, 2, 65.0).await;
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("/api/groups/g1/momentum"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["group_guid"], "g1");
    assert_eq!(body["score"], 60.0);
    assert_eq!(body["tier"], 4);
    assert_eq!(body["tier_name"], "Hot");
    assert_eq!(body["streak_days"], 2);
    assert_eq!(body["peak_score"], 65.0);
    assert_eq!(body["peak_date"], "2026-03-10");
    assert_eq!(body["computed_for"], "2026-03-11");
}

#[tokio::test]
async fn unscored_group_gets_cold_default_not_an_error() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("/api/groups/nobody-home/momentum"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["score"], 0.0);
    assert_eq!(body["tier"], 0);
    assert_eq!(body["tier_name"], "Cold");
    assert_eq!(body["streak_days"], 0);
    assert!(body["peak_date"].is_null());
    assert!(body["last_computed_at"].is_null());
}

#[tokio::test]
async fn history_replays_stored_rates() {
    let (_dir, db) = setup_test_db().await;
    seed_rate(&db, "g1", "2026-02-10", Some(0.0)).await;
    seed_rate(&db, "g1", "2026-02-11", Some(0.0)).await;
    seed_rate(&db, "g1", "2026-02-12", Some(1.0)).await;
    seed_rate(&db, "g1", "2026-02-13", Some(1.0)).await;
    seed_rate(&db, "g1", "2026-02-14", Some(1.0)).await;
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("/api/groups/g1/momentum/history"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["days"], 5);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0]["date"], "2026-02-10");
    assert_eq!(history[0]["derived_score"], 0.0);
    // Replay over 0,0,1,1,1 ends clamped at 100 then decayed
    assert_eq!(history[4]["date"], "2026-02-14");
    assert_eq!(history[4]["derived_score"], 98.0);
}

#[tokio::test]
async fn history_days_parameter_takes_the_tail() {
    let (_dir, db) = setup_test_db().await;
    seed_rate(&db, "g1", "2026-02-10", Some(0.0)).await;
    seed_rate(&db, "g1", "2026-02-11", Some(0.5)).await;
    seed_rate(&db, "g1", "2026-02-12", None).await;
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("/api/groups/g1/momentum/history?days=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["days"], 2);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history[0]["date"], "2026-02-11");
    assert_eq!(history[1]["date"], "2026-02-12");
    assert!(history[1]["rate"].is_null(), "undefined day keeps its sentinel");
}

#[tokio::test]
async fn history_is_clamped_to_the_cap() {
    let (_dir, db) = setup_test_db().await;
    // 40 days on record, cap defaults to 30
    let start = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    for i in 0..40u64 {
        let day = start + chrono::Days::new(i);
        seed_rate(&db, "g1", &day.to_string(), Some(0.5)).await;
    }
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("/api/groups/g1/momentum/history?days=100"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["days"], 30);
    assert_eq!(body["history"].as_array().unwrap().len(), 30);
}

#[tokio::test]
async fn group_without_history_gets_empty_series() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("/api/groups/g1/momentum/history"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["days"], 0);
    assert_eq!(body["history"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn tier_table_has_eight_bands_ending_at_100() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let response = app.oneshot(test_request("/api/tiers")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let tiers = body["tiers"].as_array().unwrap();
    assert_eq!(tiers.len(), 8);
    assert_eq!(tiers[0]["tier"], 0);
    assert_eq!(tiers[0]["label"], "Cold");
    assert_eq!(tiers[7]["tier"], 7);
    assert_eq!(tiers[7]["label"], "Inferno");
    assert_eq!(tiers[7]["upper_bound"], 100.0);
}
