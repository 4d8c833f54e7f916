//! Momentum ("heat") update rule
//!
//! **[HEAT-UPD-010]** One cycle combines yesterday's group completion rate
//! with a trailing 7-day baseline to move the score by delta-vs-baseline,
//! then applies multiplicative decay. The score is self-relative: a
//! previously inconsistent group that improves earns tier progress, while a
//! group coasting at a high plateau drifts down slowly instead of staying
//! pinned at the ceiling. Rewards trend, not raw magnitude.
//!
//! The function is pure and replayable: it reads only immutable rate
//! history plus a single prior snapshot. Double-apply protection lives in
//! the batch driver (`computed_for` check), not here.

use crate::db::models::MomentumState;
use crate::tiers::TierTable;
use crate::{Error, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default score delta per unit of rate delta: a 10-point rate swing vs.
/// baseline moves the score ±5.
pub const DEFAULT_SENSITIVITY: f64 = 50.0;

/// Default per-cycle contraction: 2%/day absent reinforcement.
pub const DEFAULT_DECAY: f64 = 0.98;

/// Default trailing baseline span (D-8..D-2 relative to the target date).
pub const DEFAULT_BASELINE_WINDOW_DAYS: u64 = 7;

/// Sanity bound on `heat_baseline_window_days`; a caller handing in more
/// defined rates than this has mixed up its dates
pub const MAX_BASELINE_WINDOW_DAYS: u64 = 31;

/// Tunable constants for one update cycle, loaded from settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateTuning {
    pub sensitivity: f64,
    pub decay: f64,
}

impl Default for UpdateTuning {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            decay: DEFAULT_DECAY,
        }
    }
}

impl UpdateTuning {
    /// Reject constants a batch must not run with [HEAT-ERRH-040]
    pub fn validate(&self) -> Result<()> {
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(Error::Config(format!(
                "heat_sensitivity must be finite and positive, got {}",
                self.sensitivity
            )));
        }
        if !self.decay.is_finite() || self.decay <= 0.0 || self.decay > 1.0 {
            return Err(Error::Config(format!(
                "heat_decay must be in (0, 1], got {}",
                self.decay
            )));
        }
        Ok(())
    }
}

/// Round to 2 decimal places (score storage precision)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn check_rate(rate: f64, context: &str) -> Result<()> {
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        return Err(Error::Inconsistent(format!(
            "{} rate {} outside [0, 1]",
            context, rate
        )));
    }
    Ok(())
}

/// Apply one update cycle [HEAT-UPD-010]
///
/// * `prior`: snapshot before this cycle (`MomentumState::cold` when the
///   group has no history).
/// * `rate_yesterday`: rate for D-1 where D is `target_date`; `None` is
///   the undefined sentinel (zero eligible pairs) and yields a decay-only
///   cycle, never an error.
/// * `baseline_window`: the *defined* rates of D-8..D-2, in any order.
/// * `computed_at`: threaded in rather than read from the wall clock so a
///   retried cycle reproduces its output exactly.
pub fn advance(
    prior: &MomentumState,
    rate_yesterday: Option<f64>,
    baseline_window: &[f64],
    target_date: NaiveDate,
    tuning: &UpdateTuning,
    tiers: &TierTable,
    computed_at: DateTime<Utc>,
) -> Result<MomentumState> {
    tuning.validate()?;
    if !(0.0..=100.0).contains(&prior.score) {
        return Err(Error::Inconsistent(format!(
            "prior score {} outside [0, 100] for group {}",
            prior.score, prior.group_guid
        )));
    }
    if baseline_window.len() as u64 > MAX_BASELINE_WINDOW_DAYS {
        return Err(Error::Inconsistent(format!(
            "baseline window has {} entries, expected at most {}",
            baseline_window.len(),
            MAX_BASELINE_WINDOW_DAYS
        )));
    }
    for r in baseline_window {
        check_rate(*r, "baseline")?;
    }
    if let Some(r) = rate_yesterday {
        check_rate(r, "yesterday")?;
    }

    // Baseline: mean of defined window rates; a group with no window yet
    // compares yesterday against itself, collapsing delta to 0.
    let baseline = if baseline_window.is_empty() {
        rate_yesterday
    } else {
        Some(baseline_window.iter().sum::<f64>() / baseline_window.len() as f64)
    };

    let delta = match (rate_yesterday, baseline) {
        (Some(rate), Some(base)) => rate - base,
        // Undefined rate: decay-only cycle
        _ => 0.0,
    };

    let raw = prior.score + delta * tuning.sensitivity;
    let clamped = raw.clamp(0.0, 100.0);
    let new_score = round2(clamped * tuning.decay);

    // Strict increase required; ties reset the streak
    let streak_days = if new_score > prior.score {
        prior.streak_days + 1
    } else {
        0
    };

    let (peak_score, peak_date) = if new_score > prior.peak_score {
        (new_score, Some(target_date))
    } else {
        (prior.peak_score, prior.peak_date)
    };

    Ok(MomentumState {
        group_guid: prior.group_guid.clone(),
        score: new_score,
        tier: tiers.classify(new_score),
        streak_days,
        peak_score,
        peak_date,
        computed_for: Some(target_date),
        last_computed_at: computed_at,
    })
}

/// One point of a replayed score series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayPoint {
    pub date: NaiveDate,
    pub rate: Option<f64>,
    pub derived_score: f64,
}

/// Replay the update rule over a stored rate series [HEAT-HIST-010]
///
/// Score history is not persisted day-by-day (only current state is), so
/// retrospective display derives the series by replaying `advance` over
/// stored rates from a cold start. `rates` must be ascending by date; the
/// baseline for the entry at date `d` is the defined rates in
/// `[d - window_days, d - 1]`, matching the nightly window for a run on
/// `d + 1`.
pub fn replay(
    group_guid: &str,
    rates: &[(NaiveDate, Option<f64>)],
    window_days: u64,
    tuning: &UpdateTuning,
    tiers: &TierTable,
) -> Result<Vec<ReplayPoint>> {
    replay_from(MomentumState::cold(group_guid), rates, window_days, tuning, tiers)
        .map(|(_, points)| points)
}

/// Replay from an explicit starting state, returning the final state too.
/// The backfill procedure persists the final state once at the end.
pub fn replay_from(
    initial: MomentumState,
    rates: &[(NaiveDate, Option<f64>)],
    window_days: u64,
    tuning: &UpdateTuning,
    tiers: &TierTable,
) -> Result<(MomentumState, Vec<ReplayPoint>)> {
    let mut state = initial;
    let computed_at = state.last_computed_at;
    let mut out = Vec::with_capacity(rates.len());

    for (i, (date, rate)) in rates.iter().enumerate() {
        if i > 0 && rates[i - 1].0 >= *date {
            return Err(Error::Inconsistent(format!(
                "rate history not ascending at {}",
                date
            )));
        }
        let window_start = date
            .checked_sub_days(Days::new(window_days))
            .ok_or_else(|| Error::Inconsistent(format!("date {} underflows window", date)))?;
        let window: Vec<f64> = rates[..i]
            .iter()
            .filter(|(d, _)| *d >= window_start && *d < *date)
            .filter_map(|(_, r)| *r)
            .collect();
        let target = date
            .succ_opt()
            .ok_or_else(|| Error::Inconsistent(format!("date {} overflows", date)))?;
        state = advance(&state, *rate, &window, target, tuning, tiers, computed_at)?;
        out.push(ReplayPoint {
            date: *date,
            rate: *rate,
            derived_score: state.score,
        });
    }
    Ok((state, out))
}
