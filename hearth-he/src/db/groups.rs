//! Group enumeration (collaborator-owned table, read-only)

use chrono::{DateTime, Utc};
use hearth_common::db::models::Group;
use hearth_common::{Error, Result};
use sqlx::SqlitePool;

/// All non-deleted groups, the fan-out universe for a batch run
pub async fn active_groups(pool: &SqlitePool) -> Result<Vec<Group>> {
    let rows: Vec<(String, String, String, Option<String>)> =
        sqlx::query_as("SELECT guid, name, created_on, deleted_at FROM groups WHERE deleted_at IS NULL ORDER BY guid")
            .fetch_all(pool)
            .await?;

    rows.into_iter()
        .map(|(guid, name, created_on, deleted_at)| {
            Ok(Group {
                guid,
                name,
                created_on: created_on.parse().map_err(|_| {
                    Error::Internal(format!("groups has malformed created_on '{}'", created_on))
                })?,
                deleted_at: deleted_at
                    .map(|ts| {
                        DateTime::parse_from_rfc3339(&ts)
                            .map(|dt| dt.with_timezone(&Utc))
                            .map_err(|_| {
                                Error::Internal(format!("groups has malformed deleted_at '{}'", ts))
                            })
                    })
                    .transpose()?,
            })
        })
        .collect()
}
