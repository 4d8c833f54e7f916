//! Momentum state store
//!
//! One row per group, written exactly once per successful cycle via upsert.
//! The `computed_for` column is the double-apply guard: the batch driver
//! skips the score update when a retry lands on an already-applied date.

use chrono::{DateTime, NaiveDate, Utc};
use hearth_common::db::models::MomentumState;
use hearth_common::{Error, Result};
use sqlx::SqlitePool;

fn parse_day(value: &str) -> Result<NaiveDate> {
    value
        .parse()
        .map_err(|_| Error::Internal(format!("momentum_state has malformed date '{}'", value)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::Internal(format!("momentum_state has malformed timestamp '{}'", value)))
}

/// Load a group's state, `None` when the group has never been computed
pub async fn load_state(pool: &SqlitePool, group_guid: &str) -> Result<Option<MomentumState>> {
    let row: Option<(f64, i64, i64, f64, Option<String>, Option<String>, String)> = sqlx::query_as(
        r#"
        SELECT score, tier, streak_days, peak_score, peak_date,
               computed_for, last_computed_at
        FROM momentum_state WHERE group_guid = ?
        "#,
    )
    .bind(group_guid)
    .fetch_optional(pool)
    .await?;

    row.map(
        |(score, tier, streak_days, peak_score, peak_date, computed_for, last_computed_at)| {
            Ok(MomentumState {
                group_guid: group_guid.to_string(),
                score,
                tier: tier as u8,
                streak_days,
                peak_score,
                peak_date: peak_date.map(|d| parse_day(&d)).transpose()?,
                computed_for: computed_for.map(|d| parse_day(&d)).transpose()?,
                last_computed_at: parse_timestamp(&last_computed_at)?,
            })
        },
    )
    .transpose()
}

/// Idempotent write of a group's state
pub async fn upsert_state(pool: &SqlitePool, state: &MomentumState) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO momentum_state (
            group_guid, score, tier, streak_days, peak_score,
            peak_date, computed_for, last_computed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(group_guid) DO UPDATE SET
            score = excluded.score,
            tier = excluded.tier,
            streak_days = excluded.streak_days,
            peak_score = excluded.peak_score,
            peak_date = excluded.peak_date,
            computed_for = excluded.computed_for,
            last_computed_at = excluded.last_computed_at
        "#,
    )
    .bind(&state.group_guid)
    .bind(state.score)
    .bind(state.tier as i64)
    .bind(state.streak_days)
    .bind(state.peak_score)
    .bind(state.peak_date.map(|d| d.to_string()))
    .bind(state.computed_for.map(|d| d.to_string()))
    .bind(state.last_computed_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}
