//! Tier classification table
//!
//! **[HEAT-TIER-010]** Maps a momentum score to one of 8 contiguous,
//! exhaustive, upper-bound-inclusive bands. The bands are data, not code:
//! operators tune thresholds (via the `heat_tier_table` setting) without
//! touching the update algorithm, and every consumer renders the same
//! scale from the same table.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of tiers in a valid table
pub const TIER_COUNT: usize = 8;

/// One band: scores in (previous upper bound, `upper_bound`] map to `tier`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBand {
    pub upper_bound: f64,
    pub tier: u8,
    pub label: String,
}

/// Ordered tier boundary table covering [0, 100]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    bands: Vec<TierBand>,
}

impl Default for TierTable {
    /// Built-in bands. `heat_tier_table` in settings overrides these.
    fn default() -> Self {
        let labels: [(f64, &str); TIER_COUNT] = [
            (10.0, "Cold"),
            (25.0, "Warming"),
            (40.0, "Kindled"),
            (55.0, "Glowing"),
            (70.0, "Hot"),
            (82.0, "Blazing"),
            (92.0, "Roaring"),
            (100.0, "Inferno"),
        ];
        Self {
            bands: labels
                .iter()
                .enumerate()
                .map(|(i, (upper_bound, label))| TierBand {
                    upper_bound: *upper_bound,
                    tier: i as u8,
                    label: label.to_string(),
                })
                .collect(),
        }
    }
}

impl TierTable {
    /// Build a table from bands, rejecting malformed input.
    pub fn new(bands: Vec<TierBand>) -> Result<Self> {
        let table = Self { bands };
        table.validate()?;
        Ok(table)
    }

    /// Parse the JSON form stored in the `heat_tier_table` setting:
    /// an array of `[upper_bound, tier_id, label]` triples.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<(f64, u8, String)> = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Malformed tier table JSON: {}", e)))?;
        Self::new(
            raw.into_iter()
                .map(|(upper_bound, tier, label)| TierBand { upper_bound, tier, label })
                .collect(),
        )
    }

    /// Validate table shape [HEAT-TIER-020]
    ///
    /// A malformed table is a global configuration error: the batch driver
    /// calls this pre-flight and aborts before any writes.
    pub fn validate(&self) -> Result<()> {
        if self.bands.len() != TIER_COUNT {
            return Err(Error::Config(format!(
                "Tier table must have exactly {} bands, got {}",
                TIER_COUNT,
                self.bands.len()
            )));
        }
        let mut prev_bound = 0.0_f64;
        for (i, band) in self.bands.iter().enumerate() {
            if band.tier as usize != i {
                return Err(Error::Config(format!(
                    "Tier ids must be 0..{} in order, got {} at position {}",
                    TIER_COUNT, band.tier, i
                )));
            }
            if i > 0 && band.upper_bound <= prev_bound {
                return Err(Error::Config(format!(
                    "Tier bounds must strictly increase: {} after {}",
                    band.upper_bound, prev_bound
                )));
            }
            if band.label.trim().is_empty() {
                return Err(Error::Config(format!("Tier {} has an empty label", i)));
            }
            prev_bound = band.upper_bound;
        }
        let last = self.bands.last().map(|b| b.upper_bound).unwrap_or(0.0);
        if (last - 100.0).abs() > f64::EPSILON {
            return Err(Error::Config(format!(
                "Final tier bound must be 100, got {}",
                last
            )));
        }
        Ok(())
    }

    /// Classify a score into its tier id. Total over [0, 100]; scores are
    /// clamped by the updater, so the final band absorbs any float residue.
    pub fn classify(&self, score: f64) -> u8 {
        for band in &self.bands {
            if score <= band.upper_bound {
                return band.tier;
            }
        }
        (TIER_COUNT - 1) as u8
    }

    /// Label for a tier id (read API `tier_name` field)
    pub fn label(&self, tier: u8) -> &str {
        self.bands
            .get(tier as usize)
            .map(|b| b.label.as_str())
            .unwrap_or("Unknown")
    }

    /// The full boundary table, for the `/api/tiers` endpoint
    pub fn bands(&self) -> &[TierBand] {
        &self.bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        let table = TierTable::default();
        assert!(table.validate().is_ok());
        assert_eq!(table.bands().len(), TIER_COUNT);
    }

    #[test]
    fn classify_is_total_over_score_range() {
        let table = TierTable::default();
        // Every half-point in [0, 100] maps to some tier
        let mut score = 0.0;
        let mut last_tier = 0u8;
        while score <= 100.0 {
            let tier = table.classify(score);
            assert!(tier < TIER_COUNT as u8, "score {} got tier {}", score, tier);
            assert!(tier >= last_tier, "tiers must be monotonic in score");
            last_tier = tier;
            score += 0.5;
        }
    }

    #[test]
    fn upper_bounds_are_inclusive() {
        let table = TierTable::default();
        assert_eq!(table.classify(10.0), 0);
        assert_eq!(table.classify(10.01), 1);
        assert_eq!(table.classify(25.0), 1);
        assert_eq!(table.classify(100.0), 7);
        assert_eq!(table.classify(0.0), 0);
    }

    #[test]
    fn labels_match_tiers() {
        let table = TierTable::default();
        assert_eq!(table.label(0), "Cold");
        assert_eq!(table.label(4), "Hot");
        assert_eq!(table.label(7), "Inferno");
    }

    #[test]
    fn rejects_wrong_band_count() {
        let bands: Vec<TierBand> = (0..5)
            .map(|i| TierBand {
                upper_bound: (i + 1) as f64 * 20.0,
                tier: i as u8,
                label: format!("T{}", i),
            })
            .collect();
        assert!(TierTable::new(bands).is_err());
    }

    #[test]
    fn rejects_non_increasing_bounds() {
        let mut table = TierTable::default();
        let json = serde_json::to_string(
            &table
                .bands
                .iter_mut()
                .map(|b| (b.upper_bound, b.tier, b.label.clone()))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        // Sanity: round-trips cleanly
        assert!(TierTable::from_json(&json).is_ok());

        let bad = r#"[[10.0,0,"A"],[5.0,1,"B"],[40.0,2,"C"],[55.0,3,"D"],[70.0,4,"E"],[82.0,5,"F"],[92.0,6,"G"],[100.0,7,"H"]]"#;
        assert!(TierTable::from_json(bad).is_err());
    }

    #[test]
    fn rejects_final_bound_below_100() {
        let bad = r#"[[10.0,0,"A"],[25.0,1,"B"],[40.0,2,"C"],[55.0,3,"D"],[70.0,4,"E"],[82.0,5,"F"],[92.0,6,"G"],[99.0,7,"H"]]"#;
        assert!(TierTable::from_json(bad).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(TierTable::from_json("not json").is_err());
    }
}
