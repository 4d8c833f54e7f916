//! Completion ledger reader
//!
//! **[HEAT-LEDGER-010]** Read-only snapshot queries against the
//! collaborator-owned tables: who was in the group, which daily
//! commitments were live, and what the ledger recorded, all as-of an
//! explicit date. The engine never writes any of these tables.

use chrono::NaiveDate;
use hearth_common::{Error, Result};
use sqlx::SqlitePool;

/// A member eligible on a given date
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSnapshot {
    pub member_guid: String,
    pub eligible_since: NaiveDate,
}

/// Commitment kind, determines the completion predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitmentKind {
    /// Done / not done; a ledger value of exactly 1.0 completes the pair
    Boolean,
    /// Numeric amount; completes at `value >= threshold`
    Quantity,
    /// Minutes (or other time unit); completes at `value >= threshold`
    Duration,
}

impl CommitmentKind {
    /// Parse the stored kind. An unknown kind is a computation
    /// inconsistency: it fails that group's run, not the batch.
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            "boolean" => Ok(Self::Boolean),
            "quantity" => Ok(Self::Quantity),
            "duration" => Ok(Self::Duration),
            other => Err(Error::Inconsistent(format!(
                "unknown commitment kind '{}'",
                other
            ))),
        }
    }
}

/// A daily commitment eligible on a given date
#[derive(Debug, Clone, PartialEq)]
pub struct CommitmentSnapshot {
    pub commitment_guid: String,
    pub kind: CommitmentKind,
    pub threshold: Option<f64>,
    pub eligible_since: NaiveDate,
    pub eligible_until: Option<NaiveDate>,
}

/// One ledger entry for a (member, commitment) pair on a date
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRecord {
    pub member_guid: String,
    pub commitment_guid: String,
    pub value: f64,
}

fn parse_day(value: &str, context: &str) -> Result<NaiveDate> {
    value.parse().map_err(|_| {
        Error::Inconsistent(format!("{} has malformed date '{}'", context, value))
    })
}

/// Members eligible as of `date`: joined on/before, not removed by then
pub async fn members_on(
    pool: &SqlitePool,
    group_guid: &str,
    date: NaiveDate,
) -> Result<Vec<MemberSnapshot>> {
    let day = date.to_string();
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT member_guid, joined_on FROM group_members
        WHERE group_guid = ?
          AND joined_on <= ?
          AND (removed_on IS NULL OR removed_on > ?)
        ORDER BY member_guid
        "#,
    )
    .bind(group_guid)
    .bind(&day)
    .bind(&day)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(member_guid, joined_on)| {
            Ok(MemberSnapshot {
                eligible_since: parse_day(&joined_on, "group_members.joined_on")?,
                member_guid,
            })
        })
        .collect()
}

/// Daily-cadence commitments eligible as of `date`: created on/before,
/// not archived before the date
pub async fn commitments_on(
    pool: &SqlitePool,
    group_guid: &str,
    date: NaiveDate,
) -> Result<Vec<CommitmentSnapshot>> {
    let day = date.to_string();
    let rows: Vec<(String, String, Option<f64>, String, Option<String>)> = sqlx::query_as(
        r#"
        SELECT guid, kind, threshold, created_on, archived_on FROM commitments
        WHERE group_guid = ?
          AND cadence = 'daily'
          AND created_on <= ?
          AND (archived_on IS NULL OR archived_on >= ?)
        ORDER BY guid
        "#,
    )
    .bind(group_guid)
    .bind(&day)
    .bind(&day)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(guid, kind, threshold, created_on, archived_on)| {
            Ok(CommitmentSnapshot {
                kind: CommitmentKind::parse(&kind)?,
                threshold,
                eligible_since: parse_day(&created_on, "commitments.created_on")?,
                eligible_until: archived_on
                    .map(|d| parse_day(&d, "commitments.archived_on"))
                    .transpose()?,
                commitment_guid: guid,
            })
        })
        .collect()
}

/// Ledger entries for the group's commitments on `date`
///
/// Returned rows are further restricted to the eligible (member ×
/// commitment) universe by the calculator; entries from since-removed
/// members never count.
pub async fn completions_on(
    pool: &SqlitePool,
    group_guid: &str,
    date: NaiveDate,
) -> Result<Vec<CompletionRecord>> {
    let rows: Vec<(String, String, f64)> = sqlx::query_as(
        r#"
        SELECT member_guid, commitment_guid, value FROM completions
        WHERE date = ?
          AND commitment_guid IN (SELECT guid FROM commitments WHERE group_guid = ?)
        "#,
    )
    .bind(date.to_string())
    .bind(group_guid)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(member_guid, commitment_guid, value)| CompletionRecord {
            member_guid,
            commitment_guid,
            value,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitment_kind_parses_known_values() {
        assert_eq!(CommitmentKind::parse("boolean").unwrap(), CommitmentKind::Boolean);
        assert_eq!(CommitmentKind::parse("quantity").unwrap(), CommitmentKind::Quantity);
        assert_eq!(CommitmentKind::parse("duration").unwrap(), CommitmentKind::Duration);
    }

    #[test]
    fn commitment_kind_rejects_unknown() {
        let err = CommitmentKind::parse("weekly-sprint");
        assert!(matches!(err, Err(Error::Inconsistent(_))));
    }
}
