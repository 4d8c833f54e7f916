//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// One group/day completion-rate record [HEAT-RATE-010]
///
/// `rate` is `None` when `eligible_pairs == 0`: "no signal" is distinct
/// from "zero performance" and is never stored as 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRate {
    pub group_guid: String,
    pub date: NaiveDate,
    pub eligible_pairs: i64,
    pub completed_pairs: i64,
    pub rate: Option<f64>,
    pub member_count: i64,
    pub commitment_count: i64,
    pub computed_at: DateTime<Utc>,
}

/// Current momentum state, one row per group [HEAT-UPD-020]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumState {
    pub group_guid: String,
    /// Momentum score in [0.0, 100.0], rounded to 2 decimal places
    pub score: f64,
    /// Tier id 0..=7, always `TierTable::classify(score)`
    pub tier: u8,
    /// Consecutive cycles with a strict score increase
    pub streak_days: i64,
    pub peak_score: f64,
    pub peak_date: Option<NaiveDate>,
    /// Last target date applied by the updater (double-apply guard)
    pub computed_for: Option<NaiveDate>,
    pub last_computed_at: DateTime<Utc>,
}

impl MomentumState {
    /// Cold default for a group with no history: score 0, tier 0.
    /// Served by the read API instead of an error [HEARTH-HQ-F-010].
    pub fn cold(group_guid: &str) -> Self {
        Self {
            group_guid: group_guid.to_string(),
            score: 0.0,
            tier: 0,
            streak_days: 0,
            peak_score: 0.0,
            peak_date: None,
            computed_for: None,
            last_computed_at: Utc::now(),
        }
    }
}

/// Tier transition, emitted on the event bus when a cycle changes a
/// group's tier. Ephemeral: consumed by the notification collaborator,
/// never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTransition {
    pub group_guid: String,
    pub old_tier: u8,
    pub new_tier: u8,
    pub date: NaiveDate,
}

/// Group row (collaborator-owned, read-only to the engine)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub guid: String,
    pub name: String,
    pub created_on: NaiveDate,
    pub deleted_at: Option<DateTime<Utc>>,
}
