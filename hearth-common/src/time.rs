//! Timestamp and day-boundary utilities
//!
//! Calendar days are uniform per group in UTC; per-member timezone day
//! boundaries are deliberately not modeled. Target dates are threaded
//! explicitly through every layer; only the outermost CLI/API default
//! resolves "today" from the clock.

use chrono::{DateTime, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Default target date for a batch run: today in UTC.
///
/// A run for target date D applies the completed day D-1.
pub fn default_target_date() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse a `YYYY-MM-DD` day key
pub fn parse_date(s: &str) -> crate::Result<NaiveDate> {
    s.parse()
        .map_err(|_| crate::Error::InvalidInput(format!("Invalid date '{}', expected YYYY-MM-DD", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_days() {
        assert_eq!(
            parse_date("2026-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("03/01/2026").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn default_target_date_is_today_utc() {
        assert_eq!(default_target_date(), Utc::now().date_naive());
    }
}
