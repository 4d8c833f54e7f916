//! Global parameter management
//!
//! Centralized singleton for the settings-backed engine tunables.
//! Read-frequently, write-rarely access pattern using RwLock: parameters
//! are loaded once from the `settings` table at startup and read on every
//! batch cycle and history projection.
//!
//! # Usage
//!
//! ```rust
//! use hearth_common::params::PARAMS;
//!
//! let sensitivity = *PARAMS.sensitivity.read().unwrap();
//! ```

use crate::heat::{UpdateTuning, DEFAULT_BASELINE_WINDOW_DAYS, DEFAULT_DECAY, DEFAULT_SENSITIVITY};
use crate::tiers::TierTable;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use std::sync::RwLock;
use tracing::{info, warn};

/// Global parameters singleton
pub static PARAMS: Lazy<GlobalParams> = Lazy::new(GlobalParams::default);

/// Engine tunables, one RwLock per parameter
pub struct GlobalParams {
    /// **[DBD-HEAT-010]** Score delta per unit of rate delta
    ///
    /// Default: 50.0 (a 10-point rate swing moves the score ±5)
    pub sensitivity: RwLock<f64>,

    /// **[DBD-HEAT-020]** Per-cycle multiplicative contraction
    ///
    /// Valid range: (0.0, 1.0]
    /// Default: 0.98 (score contracts 2%/day absent reinforcement)
    pub decay: RwLock<f64>,

    /// **[DBD-HEAT-030]** Trailing baseline span in days
    ///
    /// Default: 7 (window D-8..D-2 relative to the target date)
    pub baseline_window_days: RwLock<u64>,

    /// **[DBD-HEAT-040]** Maximum entries served by the history endpoint
    ///
    /// Default: 30
    pub history_cap: RwLock<u32>,

    /// **[DBD-HEAT-050]** Bounded worker pool size for the nightly batch
    ///
    /// Default: 8
    pub batch_concurrency: RwLock<usize>,

    /// **[DBD-HEAT-060]** Per-group pipeline timeout
    ///
    /// Default: 30000 ms; a group exceeding it is marked FAILED and retried
    pub group_timeout_ms: RwLock<u64>,

    /// **[DBD-HEAT-070]** Retry passes over failed groups per batch
    ///
    /// Default: 2
    pub retry_passes: RwLock<u32>,

    /// **[DBD-HEAT-080]** Backoff between retry passes
    ///
    /// Default: 500 ms
    pub retry_backoff_ms: RwLock<u64>,

    /// **[DBD-HEAT-090]** Rate history retention horizon in days
    ///
    /// Default: None (retention is a configurable policy; unset keeps
    /// history forever, no pruning)
    pub rate_retention_days: RwLock<Option<u32>>,

    /// **[DBD-HEAT-100]** Tier boundary table
    ///
    /// Default: built-in 8-band table; overridable via `heat_tier_table`
    pub tier_table: RwLock<TierTable>,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            sensitivity: RwLock::new(DEFAULT_SENSITIVITY),
            decay: RwLock::new(DEFAULT_DECAY),
            baseline_window_days: RwLock::new(DEFAULT_BASELINE_WINDOW_DAYS),
            history_cap: RwLock::new(30),
            batch_concurrency: RwLock::new(8),
            group_timeout_ms: RwLock::new(30_000),
            retry_passes: RwLock::new(2),
            retry_backoff_ms: RwLock::new(500),
            rate_retention_days: RwLock::new(None),
            tier_table: RwLock::new(TierTable::default()),
        }
    }
}

impl GlobalParams {
    /// Snapshot the update-rule constants for one batch run
    pub fn tuning(&self) -> UpdateTuning {
        UpdateTuning {
            sensitivity: *self.sensitivity.read().unwrap(),
            decay: *self.decay.read().unwrap(),
        }
    }

    /// Snapshot the tier table for one batch run
    pub fn tiers(&self) -> TierTable {
        self.tier_table.read().unwrap().clone()
    }
}

fn parse_setting<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("Setting {} has invalid value '{}'", key, value)))
}

/// Load all parameters from the settings table into `PARAMS`
///
/// Missing keys keep their compiled defaults (the DB init seeds them, but
/// a read-only consumer may see an older schema). A present-but-malformed
/// value is a configuration error: the caller must abort, not run a batch
/// with half-loaded constants.
pub async fn load_params_from_db(pool: &SqlitePool) -> Result<()> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT key, value FROM settings WHERE key LIKE 'heat_%'")
            .fetch_all(pool)
            .await?;

    for (key, value) in rows {
        match key.as_str() {
            "heat_sensitivity" => {
                *PARAMS.sensitivity.write().unwrap() = parse_setting(&key, &value)?
            }
            "heat_decay" => *PARAMS.decay.write().unwrap() = parse_setting(&key, &value)?,
            "heat_baseline_window_days" => {
                *PARAMS.baseline_window_days.write().unwrap() = parse_setting(&key, &value)?
            }
            "heat_history_cap" => {
                *PARAMS.history_cap.write().unwrap() = parse_setting(&key, &value)?
            }
            "heat_batch_concurrency" => {
                *PARAMS.batch_concurrency.write().unwrap() = parse_setting(&key, &value)?
            }
            "heat_group_timeout_ms" => {
                *PARAMS.group_timeout_ms.write().unwrap() = parse_setting(&key, &value)?
            }
            "heat_retry_passes" => {
                *PARAMS.retry_passes.write().unwrap() = parse_setting(&key, &value)?
            }
            "heat_retry_backoff_ms" => {
                *PARAMS.retry_backoff_ms.write().unwrap() = parse_setting(&key, &value)?
            }
            "heat_rate_retention_days" => {
                *PARAMS.rate_retention_days.write().unwrap() = if value.trim().is_empty() {
                    None
                } else {
                    Some(parse_setting(&key, &value)?)
                }
            }
            "heat_tier_table" => {
                if value.trim().is_empty() {
                    *PARAMS.tier_table.write().unwrap() = TierTable::default();
                } else {
                    *PARAMS.tier_table.write().unwrap() = TierTable::from_json(&value)?;
                }
            }
            other => {
                warn!("Unknown heat setting '{}' ignored", other);
            }
        }
    }

    // Fail fast on constants a batch must never run with
    PARAMS.tuning().validate()?;
    PARAMS.tier_table.read().unwrap().validate()?;

    info!(
        "Loaded heat parameters: sensitivity={}, decay={}, window={}d, concurrency={}",
        *PARAMS.sensitivity.read().unwrap(),
        *PARAMS.decay.read().unwrap(),
        *PARAMS.baseline_window_days.read().unwrap(),
        *PARAMS.batch_concurrency.read().unwrap(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = GlobalParams::default();
        assert!(params.tuning().validate().is_ok());
        assert!(params.tiers().validate().is_ok());
        assert_eq!(*params.history_cap.read().unwrap(), 30);
        assert!(params.rate_retention_days.read().unwrap().is_none());
    }

    #[test]
    fn parse_setting_rejects_garbage() {
        assert!(parse_setting::<f64>("heat_decay", "not-a-number").is_err());
        assert!(parse_setting::<u64>("heat_group_timeout_ms", "1.5").is_err());
        assert_eq!(parse_setting::<f64>("heat_decay", "0.98").unwrap(), 0.98);
    }
}
