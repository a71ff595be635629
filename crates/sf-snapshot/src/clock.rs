//! Run timestamp captured once per snapshot run

use chrono::{NaiveDateTime, SubsecRound, Utc};
use serde::Serialize;

const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// The instant a snapshot run started, at the store's microsecond precision.
///
/// Every `dbt_valid_from`, `dbt_valid_to` and scd id produced by one run is
/// derived from the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RunTimestamp(NaiveDateTime);

impl RunTimestamp {
    /// Capture the current UTC time
    pub fn now() -> Self {
        Self::from_naive(Utc::now().naive_utc())
    }

    /// Wrap an explicit time, truncated to microseconds
    pub fn from_naive(ts: NaiveDateTime) -> Self {
        Self(ts.trunc_subsecs(6))
    }

    /// The wrapped time
    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Fixed-width text form, e.g. `2024-03-01 12:00:00.000000`
    pub fn canonical(&self) -> String {
        self.0.format(CANONICAL_FORMAT).to_string()
    }

    /// SQL `TIMESTAMP` literal
    pub fn to_sql(&self) -> String {
        format!("TIMESTAMP '{}'", self.canonical())
    }
}

impl std::fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(nanos: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_nano_opt(12, 30, 5, nanos)
            .unwrap()
    }

    #[test]
    fn test_truncates_to_micros() {
        let run = RunTimestamp::from_naive(ts(123_456_789));
        assert_eq!(run.canonical(), "2024-03-01 12:30:05.123456");
        assert_eq!(run.to_sql(), "TIMESTAMP '2024-03-01 12:30:05.123456'");
    }

    #[test]
    fn test_whole_seconds_keep_fraction() {
        let run = RunTimestamp::from_naive(ts(0));
        assert_eq!(run.to_string(), "2024-03-01 12:30:05.000000");
    }

    #[test]
    fn test_ordering() {
        assert!(RunTimestamp::from_naive(ts(1_000)) < RunTimestamp::from_naive(ts(2_000)));
    }
}
