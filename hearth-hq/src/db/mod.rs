//! Database access layer for hearth-hq
//!
//! [HEARTH-HQ-NF-020]: All connections are read-only. The heat engine is
//! the sole writer; this service only ever projects what it finds.

use chrono::{DateTime, NaiveDate, Utc};
use hearth_common::db::models::MomentumState;
use hearth_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::Path;

/// Connect to the shared database in read-only mode [HEARTH-HQ-NF-020]
///
/// mode=ro only; the engine may be mid-batch in the same WAL file, so the
/// connection must still follow the WAL (no immutable flag). Stale reads
/// during a batch are acceptable.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::Config(format!(
            "Database not found: {}\nRun hearth-he first to initialize the database.",
            db_path.display()
        )));
    }

    let db_url = format!("sqlite://{}?mode=ro", db_path.display());
    let pool = SqlitePool::connect(&db_url).await?;

    // Verify read-only by attempting a write (should fail)
    #[cfg(debug_assertions)]
    {
        let write_test = sqlx::query("CREATE TABLE _test_write (id INTEGER)")
            .execute(&pool)
            .await;
        if write_test.is_ok() {
            return Err(Error::Internal(
                "database connection is not read-only".to_string(),
            ));
        }
    }

    Ok(pool)
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    s.parse()
        .map_err(|_| Error::Inconsistent(format!("stored date {:?} is not YYYY-MM-DD", s)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| Error::Inconsistent(format!("stored timestamp {:?} is not RFC 3339", s)))
}

/// Current momentum state for a group, None when the engine has never
/// scored it
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

/// Full stored rate series for a group, ascending by date
///
/// History projection replays the update rule over this series from a
/// cold start, so it always needs the whole series even when the caller
/// only displays the tail.
pub async fn rates_ascending(
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
