//! Daily completion-rate calculator
//!
//! **[HEAT-RATE-010]** Reduces one day's ledger activity for a group into
//! a single ratio: completed (member × commitment) pairs over eligible
//! pairs. Deterministic: a function of currently-queryable ledger state
//! only, never of prior computed results, so recomputation for the same
//! (group, date) always yields the same record.

use crate::ledger::{
    self, CommitmentKind, CommitmentSnapshot, CompletionRecord, MemberSnapshot,
};
use chrono::{DateTime, NaiveDate, Utc};
use hearth_common::db::models::DailyRate;
use hearth_common::{Error, Result};
use std::collections::HashMap;

/// Does this ledger value complete the commitment?
///
/// Boolean tasks require an exact 1.0; quantity/duration tasks complete at
/// or above their threshold.
fn satisfies(commitment: &CommitmentSnapshot, value: f64) -> Result<bool> {
    match commitment.kind {
        CommitmentKind::Boolean => Ok(value == 1.0),
        CommitmentKind::Quantity | CommitmentKind::Duration => {
            let threshold = commitment.threshold.ok_or_else(|| {
                Error::Inconsistent(format!(
                    "commitment {} of kind {:?} has no threshold",
                    commitment.commitment_guid, commitment.kind
                ))
            })?;
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(Error::Inconsistent(format!(
                    "commitment {} has malformed threshold {}",
                    commitment.commitment_guid, threshold
                )));
            }
            Ok(value >= threshold)
        }
    }
}

/// Pure core: reduce snapshots + ledger slice to one DailyRate
///
/// `eligible_pairs == 0` produces the undefined-rate sentinel (`rate:
/// None`), not zero; "no signal" must stay distinguishable from "zero
/// performance" downstream [HEAT-RATE-020].
pub fn assemble_rate(
    group_guid: &str,
    date: NaiveDate,
    members: &[MemberSnapshot],
    commitments: &[CommitmentSnapshot],
    completions: &[CompletionRecord],
    computed_at: DateTime<Utc>,
) -> Result<DailyRate> {
    let eligible_pairs = (members.len() * commitments.len()) as i64;

    // Index ledger entries; later duplicates cannot occur (PK on the
    // ledger covers member+commitment+date) but last-wins is harmless
    let recorded: HashMap<(&str, &str), f64> = completions
        .iter()
        .map(|c| ((c.member_guid.as_str(), c.commitment_guid.as_str()), c.value))
        .collect();

    let mut completed_pairs = 0i64;
    for member in members {
        for commitment in commitments {
            if let Some(value) = recorded.get(&(
                member.member_guid.as_str(),
                commitment.commitment_guid.as_str(),
            )) {
                if satisfies(commitment, *value)? {
                    completed_pairs += 1;
                }
            }
        }
    }

    let rate = if eligible_pairs > 0 {
        Some(completed_pairs as f64 / eligible_pairs as f64)
    } else {
        None
    };

    Ok(DailyRate {
        group_guid: group_guid.to_string(),
        date,
        eligible_pairs,
        completed_pairs,
        rate,
        member_count: members.len() as i64,
        commitment_count: commitments.len() as i64,
        computed_at,
    })
}

/// Compute the DailyRate for a group/date from the ledger
pub async fn compute_daily_rate(
    pool: &sqlx::SqlitePool,
    group_guid: &str,
    date: NaiveDate,
) -> Result<DailyRate> {
    let members = ledger::members_on(pool, group_guid, date).await?;
    let commitments = ledger::commitments_on(pool, group_guid, date).await?;
    let completions = ledger::completions_on(pool, group_guid, date).await?;
    assemble_rate(
        group_guid,
        date,
        &members,
        &commitments,
        &completions,
        hearth_common::time::now(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        "2026-03-01".parse().unwrap()
    }

    fn member(guid: &str) -> MemberSnapshot {
        MemberSnapshot {
            member_guid: guid.to_string(),
            eligible_since: "2026-01-01".parse().unwrap(),
        }
    }

    fn commitment(guid: &str, kind: CommitmentKind, threshold: Option<f64>) -> CommitmentSnapshot {
        CommitmentSnapshot {
            commitment_guid: guid.to_string(),
            kind,
            threshold,
            eligible_since: "2026-01-01".parse().unwrap(),
            eligible_until: None,
        }
    }

    fn completion(member: &str, commitment: &str, value: f64) -> CompletionRecord {
        CompletionRecord {
            member_guid: member.to_string(),
            commitment_guid: commitment.to_string(),
            value,
        }
    }

    #[test]
    fn rate_is_completed_over_eligible() {
        let members = vec![member("m1"), member("m2")];
        let commitments = vec![
            commitment("c1", CommitmentKind::Boolean, None),
            commitment("c2", CommitmentKind::Quantity, Some(10.0)),
        ];
        let completions = vec![
            completion("m1", "c1", 1.0),
            completion("m1", "c2", 12.0),
            completion("m2", "c2", 4.0), // below threshold
        ];
        let rate = assemble_rate("g", date(), &members, &commitments, &completions, Utc::now())
            .unwrap();
        assert_eq!(rate.eligible_pairs, 4);
        assert_eq!(rate.completed_pairs, 2);
        assert_eq!(rate.rate, Some(0.5));
        assert_eq!(rate.member_count, 2);
        assert_eq!(rate.commitment_count, 2);
    }

    #[test]
    fn boolean_requires_exact_one() {
        let members = vec![member("m1")];
        let commitments = vec![commitment("c1", CommitmentKind::Boolean, None)];
        for (value, expected) in [(1.0, 1i64), (0.0, 0), (0.5, 0), (2.0, 0)] {
            let completions = vec![completion("m1", "c1", value)];
            let rate =
                assemble_rate("g", date(), &members, &commitments, &completions, Utc::now())
                    .unwrap();
            assert_eq!(rate.completed_pairs, expected, "value {}", value);
        }
    }

    #[test]
    fn duration_meets_threshold_inclusively() {
        let members = vec![member("m1")];
        let commitments = vec![commitment("c1", CommitmentKind::Duration, Some(30.0))];
        let exactly = vec![completion("m1", "c1", 30.0)];
        let rate =
            assemble_rate("g", date(), &members, &commitments, &exactly, Utc::now()).unwrap();
        assert_eq!(rate.completed_pairs, 1);
    }

    #[test]
    fn zero_eligible_pairs_yields_undefined_rate() {
        // No commitments on this day: record written, rate is the sentinel
        let members = vec![member("m1"), member("m2")];
        let rate = assemble_rate("g", date(), &members, &[], &[], Utc::now()).unwrap();
        assert_eq!(rate.eligible_pairs, 0);
        assert_eq!(rate.completed_pairs, 0);
        assert_eq!(rate.rate, None);
    }

    #[test]
    fn entries_outside_the_universe_do_not_count() {
        // A completion from a non-member (removed after recording) must
        // not inflate the numerator
        let members = vec![member("m1")];
        let commitments = vec![commitment("c1", CommitmentKind::Boolean, None)];
        let completions = vec![
            completion("m1", "c1", 1.0),
            completion("ghost", "c1", 1.0),
        ];
        let rate = assemble_rate("g", date(), &members, &commitments, &completions, Utc::now())
            .unwrap();
        assert_eq!(rate.eligible_pairs, 1);
        assert_eq!(rate.completed_pairs, 1);
        assert_eq!(rate.rate, Some(1.0));
    }

    #[test]
    fn missing_threshold_is_inconsistent() {
        let members = vec![member("m1")];
        let commitments = vec![commitment("c1", CommitmentKind::Quantity, None)];
        let completions = vec![completion("m1", "c1", 5.0)];
        let result =
            assemble_rate("g", date(), &members, &commitments, &completions, Utc::now());
        assert!(matches!(result, Err(Error::Inconsistent(_))));
    }
}
