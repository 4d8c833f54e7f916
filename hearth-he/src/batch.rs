//! Nightly batch driver
//!
//! **[HEAT-BATCH-010]** Coordinates one run per target date across all
//! non-deleted groups. Per-group pipelines are independent, with no shared
//! mutable state between groups, and fan out over a bounded worker pool
//! so the store never sees unbounded concurrent load.
//!
//! # Per-group state machine
//! PENDING → RATE_COMPUTED → SCORE_UPDATED → PERSISTED
//! with FAILED reachable from any state; failed groups are collected into
//! a group-scoped retry queue and re-run in bounded backoff passes.
//!
//! # Re-run safety
//! Every write is an upsert, and `momentum_state.computed_for` guards the
//! score update: a retry for an already-applied target date refreshes the
//! rate row and skips the update, so decay and delta can never apply twice.

use crate::calculator;
use crate::db::{groups, momentum, rates};
use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use hearth_common::db::models::{Group, MomentumState, TierTransition};
use hearth_common::events::{EventBus, HeatEvent};
use hearth_common::heat::{self, UpdateTuning};
use hearth_common::params::PARAMS;
use hearth_common::tiers::TierTable;
use hearth_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-group pipeline state [HEAT-BATCH-020]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupRunState {
    Pending,
    RateComputed,
    ScoreUpdated,
    Persisted,
    Failed,
}

/// Result of one group's pipeline
#[derive(Debug, Clone, Serialize)]
pub struct GroupOutcome {
    pub group_guid: String,
    pub state: GroupRunState,
    /// True when the double-apply guard short-circuited the score update
    pub skipped: bool,
    pub transition: Option<TierTransition>,
    pub error: Option<String>,
}

impl GroupOutcome {
    fn failed(group_guid: &str, error: impl Into<String>) -> Self {
        Self {
            group_guid: group_guid.to_string(),
            state: GroupRunState::Failed,
            skipped: false,
            transition: None,
            error: Some(error.into()),
        }
    }
}

/// Summary of one batch run, served by `/api/batch/status`
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub date: NaiveDate,
    pub total_groups: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub retried: usize,
    pub pruned_rate_rows: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Parameter snapshot for one run; PARAMS is not re-read mid-batch
#[derive(Debug, Clone)]
struct RunSettings {
    tuning: UpdateTuning,
    tiers: TierTable,
    window_days: u64,
    concurrency: usize,
    timeout_ms: u64,
    retry_passes: u32,
    retry_backoff_ms: u64,
    retention_days: Option<u32>,
}

impl RunSettings {
    /// Snapshot and validate configuration pre-flight [HEAT-ERRH-040]
    ///
    /// A malformed tier table or tuning constant is a global blocker: the
    /// run aborts here, before any write to any group.
    fn snapshot() -> Result<Self> {
        let tuning = PARAMS.tuning();
        tuning.validate()?;
        let tiers = PARAMS.tiers();
        tiers.validate()?;
        let concurrency = *PARAMS.batch_concurrency.read().unwrap();
        if concurrency == 0 {
            return Err(Error::Config(
                "heat_batch_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            tuning,
            tiers,
            window_days: *PARAMS.baseline_window_days.read().unwrap(),
            concurrency,
            timeout_ms: *PARAMS.group_timeout_ms.read().unwrap(),
            retry_passes: *PARAMS.retry_passes.read().unwrap(),
            retry_backoff_ms: *PARAMS.retry_backoff_ms.read().unwrap(),
            retention_days: *PARAMS.rate_retention_days.read().unwrap(),
        })
    }
}

/// Batch driver service
#[derive(Clone)]
pub struct BatchDriver {
    db: SqlitePool,
    events: EventBus,
}

impl BatchDriver {
    pub fn new(db: SqlitePool, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Run the nightly batch for a target date
    pub async fn run(&self, target_date: NaiveDate) -> Result<BatchSummary> {
        self.run_with_cancel(target_date, CancellationToken::new())
            .await
    }

    /// Run with an external cancellation token
    ///
    /// Cancellation stops scheduling new groups; groups already in flight
    /// finish their (idempotent) writes.
    pub async fn run_with_cancel(
        &self,
        target_date: NaiveDate,
        cancel: CancellationToken,
    ) -> Result<BatchSummary> {
        let started_at = Utc::now();
        let settings = RunSettings::snapshot()?;

        let group_list = groups::active_groups(&self.db).await?;
        info!(
            "Heat batch starting for {}: {} groups, concurrency {}",
            target_date,
            group_list.len(),
            settings.concurrency
        );
        self.events.emit(HeatEvent::BatchStarted {
            date: target_date,
            group_count: group_list.len(),
            timestamp: started_at,
        });

        let mut outcomes: HashMap<String, GroupOutcome> = self
            .run_pass(&group_list, target_date, &settings, &cancel)
            .await
            .into_iter()
            .map(|o| (o.group_guid.clone(), o))
            .collect();

        // Group-scoped retry queue: only failed groups re-run, with backoff
        let mut retried = 0usize;
        for pass in 1..=settings.retry_passes {
            let retry_queue: Vec<Group> = group_list
                .iter()
                .filter(|g| {
                    outcomes
                        .get(&g.guid)
                        .map_or(false, |o| o.state == GroupRunState::Failed)
                })
                .cloned()
                .collect();
            if retry_queue.is_empty() || cancel.is_cancelled() {
                break;
            }
            let backoff = Duration::from_millis(settings.retry_backoff_ms * pass as u64);
            warn!(
                "Retry pass {}: {} failed groups, backing off {:?}",
                pass,
                retry_queue.len(),
                backoff
            );
            tokio::time::sleep(backoff).await;
            retried += retry_queue.len();
            for outcome in self
                .run_pass(&retry_queue, target_date, &settings, &cancel)
                .await
            {
                outcomes.insert(outcome.group_guid.clone(), outcome);
            }
        }

        // Retention is policy, not code: nothing is pruned unless the
        // operator sets a horizon
        let pruned_rate_rows = match settings.retention_days {
            Some(days) => {
                let cutoff = target_date
                    .checked_sub_days(Days::new(days as u64))
                    .unwrap_or(target_date);
                let pruned = rates::prune_before(&self.db, cutoff).await?;
                if pruned > 0 {
                    info!("Pruned {} rate rows older than {}", pruned, cutoff);
                }
                pruned
            }
            None => 0,
        };

        let succeeded = outcomes
            .values()
            .filter(|o| o.state == GroupRunState::Persisted && !o.skipped)
            .count();
        let skipped = outcomes.values().filter(|o| o.skipped).count();
        let failed = outcomes
            .values()
            .filter(|o| o.state == GroupRunState::Failed)
            .count();
        let finished_at = Utc::now();

        for outcome in outcomes.values() {
            if let Some(err) = &outcome.error {
                error!(
                    "Group {} run for {} failed after retries: {}",
                    outcome.group_guid, target_date, err
                );
            }
        }
        info!(
            "Heat batch for {} done: {} succeeded, {} failed, {} skipped",
            target_date, succeeded, failed, skipped
        );
        self.events.emit(HeatEvent::BatchCompleted {
            date: target_date,
            succeeded,
            failed,
            skipped,
            timestamp: finished_at,
        });

        Ok(BatchSummary {
            date: target_date,
            total_groups: group_list.len(),
            succeeded,
            failed,
            skipped,
            retried,
            pruned_rate_rows,
            started_at,
            finished_at,
        })
    }

    /// One bounded-concurrency pass over a set of groups
    async fn run_pass(
        &self,
        group_list: &[Group],
        target_date: NaiveDate,
        settings: &RunSettings,
        cancel: &CancellationToken,
    ) -> Vec<GroupOutcome> {
        let semaphore = Arc::new(Semaphore::new(settings.concurrency));
        let mut tasks = FuturesUnordered::new();

        for group in group_list {
            let semaphore = Arc::clone(&semaphore);
            let db = self.db.clone();
            let events = self.events.clone();
            let settings = settings.clone();
            let cancel = cancel.clone();
            let group = group.clone();

            tasks.push(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return GroupOutcome::failed(&group.guid, "worker pool closed"),
                };
                if cancel.is_cancelled() {
                    return GroupOutcome::failed(&group.guid, "batch cancelled");
                }

                let timeout = Duration::from_millis(settings.timeout_ms);
                let result = tokio::time::timeout(
                    timeout,
                    run_group(&db, &events, &group, target_date, &settings),
                )
                .await;

                match result {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        warn!("Group {} failed for {}: {}", group.guid, target_date, e);
                        events.emit(HeatEvent::GroupFailed {
                            group_guid: group.guid.clone(),
                            date: target_date,
                            error: e.to_string(),
                            timestamp: Utc::now(),
                        });
                        GroupOutcome::failed(&group.guid, e.to_string())
                    }
                    Err(_) => {
                        warn!(
                            "Group {} timed out after {:?} for {}",
                            group.guid, timeout, target_date
                        );
                        events.emit(HeatEvent::GroupFailed {
                            group_guid: group.guid.clone(),
                            date: target_date,
                            error: format!("timed out after {:?}", timeout),
                            timestamp: Utc::now(),
                        });
                        GroupOutcome::failed(&group.guid, format!("timed out after {:?}", timeout))
                    }
                }
            });
        }

        let mut outcomes = Vec::with_capacity(group_list.len());
        while let Some(outcome) = tasks.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// One group's pipeline: rate → update → classify → persist
///
/// Steps are strictly sequential; the momentum write happens-after the
/// rate write for the same date. Any error leaves the prior momentum
/// state untouched; the state row is written exactly once, at the end.
async fn run_group(
    db: &SqlitePool,
    events: &EventBus,
    group: &Group,
    target_date: NaiveDate,
    settings: &RunSettings,
) -> Result<GroupOutcome> {
    let mut state = GroupRunState::Pending;
    let rate_date = target_date
        .pred_opt()
        .ok_or_else(|| Error::Inconsistent(format!("target date {} underflows", target_date)))?;

    let rate = calculator::compute_daily_rate(db, &group.guid, rate_date).await?;
    rates::upsert_daily_rate(db, &rate).await?;
    state = GroupRunState::RateComputed;
    debug!("Group {}: {:?} (rate {:?})", group.guid, state, rate.rate);

    let prior = momentum::load_state(db, &group.guid)
        .await?
        .unwrap_or_else(|| MomentumState::cold(&group.guid));

    // Double-apply guard: a retried run for an applied date is a no-op
    // beyond refreshing the rate row
    if prior.computed_for.is_some_and(|d| d >= target_date) {
        debug!(
            "Group {}: update for {} already applied (computed_for {:?}), skipping",
            group.guid, target_date, prior.computed_for
        );
        return Ok(GroupOutcome {
            group_guid: group.guid.clone(),
            state: GroupRunState::Persisted,
            skipped: true,
            transition: None,
            error: None,
        });
    }

    let window =
        rates::baseline_window(db, &group.guid, target_date, settings.window_days).await?;
    let next = heat::advance(
        &prior,
        rate.rate,
        &window,
        target_date,
        &settings.tuning,
        &settings.tiers,
        Utc::now(),
    )?;
    state = GroupRunState::ScoreUpdated;
    debug!(
        "Group {}: {:?} (score {} -> {})",
        group.guid, state, prior.score, next.score
    );

    momentum::upsert_state(db, &next).await?;
    state = GroupRunState::Persisted;
    debug!("Group {}: {:?}", group.guid, state);

    let transition = (prior.tier != next.tier).then(|| TierTransition {
        group_guid: group.guid.clone(),
        old_tier: prior.tier,
        new_tier: next.tier,
        date: target_date,
    });
    if let Some(t) = &transition {
        info!(
            "Group {} tier {} -> {} on {}",
            group.guid, t.old_tier, t.new_tier, target_date
        );
        events.emit(HeatEvent::TierChanged {
            transition: t.clone(),
            timestamp: Utc::now(),
        });
    }
    events.emit(HeatEvent::GroupCompleted {
        group_guid: group.guid.clone(),
        date: target_date,
        score: next.score,
        tier: next.tier,
        timestamp: Utc::now(),
    });

    Ok(GroupOutcome {
        group_guid: group.guid.clone(),
        state,
        skipped: false,
        transition,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_states_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&GroupRunState::RateComputed).unwrap(),
            "\"RATE_COMPUTED\""
        );
        assert_eq!(
            serde_json::to_string(&GroupRunState::ScoreUpdated).unwrap(),
            "\"SCORE_UPDATED\""
        );
        assert_eq!(
            serde_json::to_string(&GroupRunState::Failed).unwrap(),
            "\"FAILED\""
        );
    }
}
