//! Expiry date validation.
//!
//! Expiry dates are civil calendar dates (`YYYY-MM-DD`) interpreted in a
//! fixed UTC offset, not the host timezone: a license must stop working at
//! the same wall-clock boundary no matter where the issuing server runs.
//! The offset is explicit configuration (UTC+8 by default) rather than a
//! timezone-database lookup, so there is no hidden environmental dependency.
//!
//! A license expires at the *last second* of its stated day: civil midnight
//! plus 24 hours minus 1 second, converted to an absolute UTC instant.

use std::sync::OnceLock;

use chrono::{DateTime, Days, Duration, FixedOffset, Months, NaiveDate, NaiveTime, Utc};
use regex::Regex;

use crate::errors::{LicenseError, LicenseResult};

/// Default civil timezone for expiry boundaries: UTC+8.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

fn date_format_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Strict zero-padded form only; chrono's parser alone would accept
    // variants like "2025-6-15".
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())
}

/// How far ahead an expiry date may lie.
///
/// The horizon is measured in civil months plus days from the civil date of
/// "now". Whether or not a horizon is set, a date whose end-of-day instant
/// has already passed is always rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    max_horizon: Option<(u32, u64)>,
}

impl ExpiryPolicy {
    /// Standard policy: at most one calendar month plus one day ahead.
    pub fn standard() -> Self {
        Self::with_horizon(1, 1)
    }

    /// Only reject dates already in the past.
    pub fn not_in_past() -> Self {
        Self { max_horizon: None }
    }

    /// Cap issuance at `months` civil months plus `days` days ahead.
    pub fn with_horizon(months: u32, days: u64) -> Self {
        Self {
            max_horizon: Some((months, days)),
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Converts calendar dates to absolute expiry instants and enforces policy.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryCalculator {
    offset: FixedOffset,
}

impl ExpiryCalculator {
    /// Calculator for the given fixed UTC offset.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Calculator for a whole-hour UTC offset, e.g. `8` for UTC+8.
    ///
    /// Offsets outside ±23 hours are a configuration error.
    pub fn from_offset_hours(hours: i32) -> LicenseResult<Self> {
        let offset = FixedOffset::east_opt(hours * 3600).ok_or_else(|| {
            LicenseError::Config(format!("invalid UTC offset: {hours} hours"))
        })?;
        Ok(Self::new(offset))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Parse a strict `YYYY-MM-DD` date string into a civil date.
    fn parse_date(&self, date_str: &str) -> LicenseResult<NaiveDate> {
        if !date_format_regex().is_match(date_str) {
            return Err(LicenseError::DateFormat(format!(
                "'{date_str}' does not match YYYY-MM-DD"
            )));
        }
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| {
            LicenseError::DateFormat(format!("'{date_str}' is not a valid calendar date"))
        })
    }

    /// End-of-day instant for a civil date: midnight + 24h − 1s, as UTC.
    fn end_of_day_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        // Fixed offsets have no DST gaps, so the local time is unambiguous.
        let start = midnight.and_local_timezone(self.offset).unwrap();
        (start + Duration::days(1) - Duration::seconds(1)).with_timezone(&Utc)
    }

    /// Validate an expiry date string against the policy, relative to an
    /// injected `now`, and return the absolute expiry instant.
    pub fn validate(
        &self,
        date_str: &str,
        now: DateTime<Utc>,
        policy: &ExpiryPolicy,
    ) -> LicenseResult<DateTime<Utc>> {
        let date = self.parse_date(date_str)?;
        let expiry = self.end_of_day_utc(date);

        if expiry < now {
            return Err(LicenseError::ExpiryOutOfRange(format!(
                "expiry date {date_str} is in the past"
            )));
        }

        if let Some((months, days)) = policy.max_horizon {
            // The cap is a civil-date comparison: "one month and a day from
            // today", not an instant comparison, so the last allowed day is
            // accepted in full.
            let today = now.with_timezone(&self.offset).date_naive();
            let limit = today
                .checked_add_months(Months::new(months))
                .and_then(|d| d.checked_add_days(Days::new(days)))
                .ok_or_else(|| {
                    LicenseError::ExpiryOutOfRange("issuance horizon overflow".to_string())
                })?;
            if date > limit {
                return Err(LicenseError::ExpiryOutOfRange(format!(
                    "expiry date {date_str} is beyond the issuance horizon ({limit})"
                )));
            }
        }

        Ok(expiry)
    }
}

impl Default for ExpiryCalculator {
    fn default() -> Self {
        // DEFAULT_UTC_OFFSET_HOURS is within range.
        Self::from_offset_hours(DEFAULT_UTC_OFFSET_HOURS).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn end_of_day_is_last_second_in_civil_timezone() {
        let calc = ExpiryCalculator::default();
        let expiry = calc
            .validate("2025-06-15", utc("2025-06-01T00:00:00Z"), &ExpiryPolicy::standard())
            .unwrap();

        // 2025-06-15T23:59:59+08:00 == 2025-06-15T15:59:59Z
        assert_eq!(expiry, utc("2025-06-15T15:59:59Z"));
        let local = expiry.with_timezone(&calc.offset());
        assert_eq!(local.time(), NaiveTime::from_hms_opt(23, 59, 59).unwrap());
    }

    #[test]
    fn horizon_accepts_one_month_plus_one_day() {
        let calc = ExpiryCalculator::default();
        let now = utc("2025-01-01T00:00:00Z");
        let policy = ExpiryPolicy::standard();

        assert!(calc.validate("2025-02-02", now, &policy).is_ok());
        let err = calc.validate("2025-02-03", now, &policy).unwrap_err();
        assert!(matches!(err, LicenseError::ExpiryOutOfRange(_)));
    }

    #[test]
    fn horizon_handles_month_end_rollover() {
        let calc = ExpiryCalculator::default();
        let now = utc("2025-01-31T00:00:00Z");
        let policy = ExpiryPolicy::standard();

        // Jan 31 + 1 month clamps to Feb 28, + 1 day = Mar 1.
        assert!(calc.validate("2025-03-01", now, &policy).is_ok());
        assert!(calc.validate("2025-03-02", now, &policy).is_err());
    }

    #[test]
    fn past_dates_are_rejected_even_without_horizon() {
        let calc = ExpiryCalculator::default();
        let now = utc("2025-06-16T00:00:00Z");
        let err = calc
            .validate("2025-06-14", now, &ExpiryPolicy::not_in_past())
            .unwrap_err();
        assert!(matches!(err, LicenseError::ExpiryOutOfRange(_)));
    }

    #[test]
    fn today_is_accepted_because_expiry_is_end_of_day() {
        let calc = ExpiryCalculator::default();
        // 2025-06-15T10:00:00+08:00
        let now = calc
            .offset()
            .with_ymd_and_hms(2025, 6, 15, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(calc
            .validate("2025-06-15", now, &ExpiryPolicy::not_in_past())
            .is_ok());
    }

    #[test]
    fn malformed_dates_are_date_format_errors() {
        let calc = ExpiryCalculator::default();
        let now = utc("2025-01-01T00:00:00Z");
        let policy = ExpiryPolicy::not_in_past();

        for bad in [
            "2025/06/15",
            "15-06-2025",
            "2025-6-15",
            "2025-06-15T00:00:00",
            "not-a-date",
            "",
            "2025-13-01",
            "2025-02-30",
        ] {
            let err = calc.validate(bad, now, &policy).unwrap_err();
            assert!(matches!(err, LicenseError::DateFormat(_)), "input: {bad:?}");
        }
    }

    #[test]
    fn offset_is_explicit_configuration() {
        let calc = ExpiryCalculator::from_offset_hours(0).unwrap();
        let expiry = calc
            .validate("2025-06-15", utc("2025-06-01T00:00:00Z"), &ExpiryPolicy::not_in_past())
            .unwrap();
        assert_eq!(expiry, utc("2025-06-15T23:59:59Z"));

        assert!(ExpiryCalculator::from_offset_hours(30).is_err());
    }
}
