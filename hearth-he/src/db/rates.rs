//! Rate history store
//!
//! One row per (group, date). All writes are upserts keyed on the primary
//! key, never check-then-insert, so overlapping retries cannot race into
//! an inconsistent state [HEAT-BATCH-040].

use chrono::{DateTime, Days, NaiveDate, Utc};
use hearth_common::db::models::DailyRate;
use hearth_common::{Error, Result};
use sqlx::SqlitePool;

fn parse_day(value: &str) -> Result<NaiveDate> {
    value
        .parse()
        .map_err(|_| Error::Internal(format!("daily_rates has malformed date '{}'", value)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::Internal(format!("daily_rates has malformed timestamp '{}'", value)))
}

/// Idempotent write of one rate record
pub async fn upsert_daily_rate(pool: &SqlitePool, rate: &DailyRate) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_rates (
            group_guid, date, eligible_pairs, completed_pairs, rate,
            member_count, commitment_count, computed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(group_guid, date) DO UPDATE SET
            eligible_pairs = excluded.eligible_pairs,
            completed_pairs = excluded.completed_pairs,
            rate = excluded.rate,
            member_count = excluded.member_count,
            commitment_count = excluded.commitment_count,
            computed_at = excluded.computed_at
        "#,
    )
    .bind(&rate.group_guid)
    .bind(rate.date.to_string())
    .bind(rate.eligible_pairs)
    .bind(rate.completed_pairs)
    .bind(rate.rate)
    .bind(rate.member_count)
    .bind(rate.commitment_count)
    .bind(rate.computed_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load one rate record
pub async fn get_daily_rate(
    pool: &SqlitePool,
    group_guid: &str,
    date: NaiveDate,
) -> Result<Option<DailyRate>> {
    let row: Option<(i64, i64, Option<f64>, i64, i64, String)> = sqlx::query_as(
        r#"
        SELECT eligible_pairs, completed_pairs, rate, member_count,
               commitment_count, computed_at
        FROM daily_rates WHERE group_guid = ? AND date = ?
        "#,
    )
    .bind(group_guid)
    .bind(date.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(
        |(eligible_pairs, completed_pairs, rate, member_count, commitment_count, computed_at)| {
            Ok(DailyRate {
                group_guid: group_guid.to_string(),
                date,
                eligible_pairs,
                completed_pairs,
                rate,
                member_count,
                commitment_count,
                computed_at: parse_timestamp(&computed_at)?,
            })
        },
    )
    .transpose()
}

/// Defined rates in the baseline window D-8..D-2 for a run on `target_date`
///
/// The window is date-keyed: days the batch never computed simply aren't
/// in it, matching the pure replay semantics.
pub async fn baseline_window(
    pool: &SqlitePool,
    group_guid: &str,
    target_date: NaiveDate,
    window_days: u64,
) -> Result<Vec<f64>> {
    let end = target_date
        .checked_sub_days(Days::new(2))
        .ok_or_else(|| Error::Inconsistent(format!("target date {} underflows", target_date)))?;
    let start = target_date
        .checked_sub_days(Days::new(window_days + 1))
        .ok_or_else(|| Error::Inconsistent(format!("target date {} underflows", target_date)))?;

    let rates: Vec<f64> = sqlx::query_scalar(
        r#"
        SELECT rate FROM daily_rates
        WHERE group_guid = ? AND date >= ? AND date <= ? AND rate IS NOT NULL
        ORDER BY date
        "#,
    )
    .bind(group_guid)
    .bind(start.to_string())
    .bind(end.to_string())
    .fetch_all(pool)
    .await?;
    Ok(rates)
}

/// Full stored rate series for a group, ascending by date
///
/// Input to the history projection replay; bounded in practice by the
/// retention policy.
pub async fn all_rates_ascending(
    pool: &SqlitePool,
    group_guid: &str,
) -> Result<Vec<(NaiveDate, Option<f64>)>> {
    let rows: Vec<(String, Option<f64>)> = sqlx::query_as(
        "SELECT date, rate FROM daily_rates WHERE group_guid = ? ORDER BY date",
    )
    .bind(group_guid)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(date, rate)| Ok((parse_day(&date)?, rate)))
        .collect()
}

/// Drop rate rows older than the retention horizon [HEAT-RET-010]
///
/// Returns the number of pruned rows. Never called unless the operator
/// sets `heat_rate_retention_days`.
pub async fn prune_before(pool: &SqlitePool, cutoff: NaiveDate) -> Result<u64> {
    let result = sqlx::query("DELETE FROM daily_rates WHERE date < ?")
        .bind(cutoff.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
