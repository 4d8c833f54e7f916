//! Integration tests for the cold-start backfill procedure

use chrono::{NaiveDate, Utc};
use hearth_common::db::models::DailyRate;
use hearth_common::events::EventBus;
use hearth_he::backfill;
use hearth_he::db::{momentum, rates};
use serial_test::serial;
use sqlx::SqlitePool;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

async fn setup() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = hearth_common::db::init_database(&dir.path().join("hearth.db"))
        .await
        .expect("init database");
    (dir, pool)
}

async fn seed_ledger(pool: &SqlitePool) {
    sqlx::query("INSERT INTO groups (guid, name, created_on) VALUES ('g1', 'Group g1', '2026-02-01')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO group_members (group_guid, member_guid, joined_on) VALUES ('g1', 'm1', '2026-02-01')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO commitments (guid, group_guid, title, kind, threshold, cadence, created_on) \
         VALUES ('c1', 'g1', 'Commitment c1', 'boolean', NULL, 'daily', '2026-02-01')",
    )
    .execute(pool)
    .await
    .unwrap();
    // Two quiet days, then three perfect days
    for day in ["2026-02-12", "2026-02-13", "2026-02-14"] {
        sqlx::query(
            "INSERT INTO completions (member_guid, commitment_guid, date, value, recorded_at) \
             VALUES ('m1', 'c1', ?, 1.0, ?)",
        )
        .bind(day)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
    }
}

#[tokio::test]
#[serial]
async fn backfill_builds_rates_and_state_from_ledger() {
    let (_dir, pool) = setup().await;
    seed_ledger(&pool).await;

    let events = EventBus::new(64);
    let state = backfill::backfill_group(&pool, &events, "g1", date("2026-02-10"), date("2026-02-14"))
        .await
        .unwrap();

    let series = rates::all_rates_ascending(&pool, "g1").await.unwrap();
    assert_eq!(series.len(), 5);
    assert_eq!(series[0].0, date("2026-02-10"));
    assert_eq!(series[0].1, Some(0.0));
    assert_eq!(series[4].1, Some(1.0));

    // Replay over 0,0,1,1,1: two flat days, then 49.0 -> 80.69 -> clamp -> 98.0
    assert_eq!(state.score, 98.0);
    assert_eq!(state.tier, 7);
    assert_eq!(state.streak_days, 3);
    assert_eq!(state.peak_score, 98.0);
    assert_eq!(state.computed_for, Some(date("2026-02-15")));

    let stored = momentum::load_state(&pool, "g1").await.unwrap().unwrap();
    assert_eq!(stored.score, state.score);
    assert_eq!(stored.computed_for, state.computed_for);
}

#[tokio::test]
#[serial]
async fn backfill_never_rewrites_existing_rate_rows() {
    let (_dir, pool) = setup().await;
    seed_ledger(&pool).await;

    // A nightly batch already scored 2026-02-13 with a hand-entered correction
    rates::upsert_daily_rate(
        &pool,
        &DailyRate {
            group_guid: "g1".to_string(),
            date: date("2026-02-13"),
            eligible_pairs: 2,
            completed_pairs: 1,
            rate: Some(0.5),
            member_count: 2,
            commitment_count: 1,
            computed_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let events = EventBus::new(64);
    backfill::backfill_group(&pool, &events, "g1", date("2026-02-10"), date("2026-02-14"))
        .await
        .unwrap();

    let row = rates::get_daily_rate(&pool, "g1", date("2026-02-13"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.rate, Some(0.5), "existing history must be immutable");
    assert_eq!(row.eligible_pairs, 2);
}

#[tokio::test]
#[serial]
async fn backfill_is_idempotent() {
    let (_dir, pool) = setup().await;
    seed_ledger(&pool).await;

    let events = EventBus::new(64);
    let first = backfill::backfill_group(&pool, &events, "g1", date("2026-02-10"), date("2026-02-14"))
        .await
        .unwrap();
    let second = backfill::backfill_group(&pool, &events, "g1", date("2026-02-10"), date("2026-02-14"))
        .await
        .unwrap();

    assert_eq!(second.score, first.score);
    assert_eq!(second.streak_days, first.streak_days);
    assert_eq!(second.computed_for, first.computed_for);
    assert_eq!(rates::all_rates_ascending(&pool, "g1").await.unwrap().len(), 5);
}

#[tokio::test]
#[serial]
async fn inverted_range_is_rejected() {
    let (_dir, pool) = setup().await;
    seed_ledger(&pool).await;

    let events = EventBus::new(64);
    let result =
        backfill::backfill_group(&pool, &events, "g1", date("2026-02-14"), date("2026-02-10")).await;
    assert!(matches!(result, Err(hearth_common::Error::InvalidInput(_))));
}
