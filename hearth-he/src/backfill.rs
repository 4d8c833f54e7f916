//! Cold-start / backfill procedure
//!
//! **[HEAT-BACKFILL-010]** Builds momentum state for groups that predate
//! the engine (or whose history has gaps): compute the missing DailyRate
//! rows from the ledger for each day in the range, then replay the pure
//! update rule over the full stored series and persist the final state
//! once. Existing rate rows are left alone (past dates are immutable),
//! so a backfill never rewrites history the nightly batch already owns.

use crate::calculator;
use crate::db::{groups, momentum, rates};
use chrono::{Days, NaiveDate};
use hearth_common::db::models::MomentumState;
use hearth_common::events::{EventBus, HeatEvent};
use hearth_common::heat;
use hearth_common::params::PARAMS;
use hearth_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Backfill one group over `[from, to]` (rate dates, inclusive)
pub async fn backfill_group(
    db: &SqlitePool,
    events: &EventBus,
    group_guid: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<MomentumState> {
    if from > to {
        return Err(Error::InvalidInput(format!(
            "backfill range {}..{} is inverted",
            from, to
        )));
    }
    let tuning = PARAMS.tuning();
    tuning.validate()?;
    let tiers = PARAMS.tiers();
    tiers.validate()?;
    let window_days = *PARAMS.baseline_window_days.read().unwrap();

    // Fill only the holes; existing rows are immutable history
    let mut filled = 0usize;
    let mut day = from;
    while day <= to {
        if rates::get_daily_rate(db, group_guid, day).await?.is_none() {
            let rate = calculator::compute_daily_rate(db, group_guid, day).await?;
            rates::upsert_daily_rate(db, &rate).await?;
            filled += 1;
        }
        day = day
            .checked_add_days(Days::new(1))
            .ok_or_else(|| Error::Inconsistent(format!("date {} overflows", day)))?;
    }

    let series = rates::all_rates_ascending(db, group_guid).await?;
    if series.is_empty() {
        warn!("Backfill for {} found no rate history at all", group_guid);
        return Ok(MomentumState::cold(group_guid));
    }

    let prior_tier = momentum::load_state(db, group_guid)
        .await?
        .map(|s| s.tier)
        .unwrap_or(0);

    let (mut state, _points) = heat::replay_from(
        MomentumState::cold(group_guid),
        &series,
        window_days,
        &tuning,
        &tiers,
    )?;
    state.last_computed_at = hearth_common::time::now();
    momentum::upsert_state(db, &state).await?;

    if state.tier != prior_tier {
        events.emit(HeatEvent::TierChanged {
            transition: hearth_common::db::models::TierTransition {
                group_guid: group_guid.to_string(),
                old_tier: prior_tier,
                new_tier: state.tier,
                date: to,
            },
            timestamp: hearth_common::time::now(),
        });
    }

    info!(
        "Backfilled {}: {} missing rate rows computed, score {} (tier {})",
        group_guid, filled, state.score, state.tier
    );
    Ok(state)
}

/// Backfill every active group over the same range
///
/// Failures are isolated per group, matching the nightly batch.
pub async fn backfill_all(
    db: &SqlitePool,
    events: &EventBus,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<usize> {
    let group_list = groups::active_groups(db).await?;
    let mut succeeded = 0usize;
    for group in &group_list {
        match backfill_group(db, events, &group.guid, from, to).await {
            Ok(_) => succeeded += 1,
            Err(e) => warn!("Backfill failed for {}: {}", group.guid, e),
        }
    }
    info!(
        "Backfill {}..{} complete: {}/{} groups",
        from,
        to,
        succeeded,
        group_list.len()
    );
    Ok(succeeded)
}
