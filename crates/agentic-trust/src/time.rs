//! Time utilities for AgenticTrust.
//!
//! All timestamps are `chrono::DateTime<Utc>` and serialize as ISO-8601
//! UTC strings. Time windows are expressed in minutes of day.

use chrono::{DateTime, Timelike, Utc};

/// Minutes in a day; time windows wrap modulo this.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Return the current UTC time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Minute of day (0..1440) for a timestamp.
pub fn minute_of_day(at: DateTime<Utc>) -> u32 {
    at.hour() * 60 + at.minute()
}
