//! DateTime display utilities.
//!
//! This module provides wrapper types for formatting timestamps in a
//! consistent, human-readable format using system timezone, plus a
//! compact relative-age form for session views.

use std::fmt;

use jiff::{tz::TimeZone, Timestamp};

/// A wrapper around `Timestamp` that provides system timezone formatting via
/// the `Display` trait.
///
/// # Format
///
/// The display format follows the pattern: `YYYY-MM-DD HH:MM:SS TZ`
/// - Year, month, and day are zero-padded
/// - Time is in 24-hour format with zero-padded components
/// - Timezone abbreviation is included (e.g., UTC, EST, JST)
pub struct LocalDateTime<'a>(pub &'a Timestamp);

impl fmt::Display for LocalDateTime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .to_zoned(TimeZone::system())
                .strftime("%Y-%m-%d %H:%M:%S %Z")
        )
    }
}

/// Compact age of a timestamp relative to a reference instant, as used in
/// the sessions view: `42s`, `17m`, `3h`, `2d`.
pub struct RelativeAge {
    pub at: Timestamp,
    pub now: Timestamp,
}

impl fmt::Display for RelativeAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.now.duration_since(self.at).as_secs().max(0);
        if seconds < 60 {
            write!(f, "{seconds}s")
        } else if seconds < 3600 {
            write!(f, "{}m", seconds / 60)
        } else if seconds < 86400 {
            write!(f, "{}h", seconds / 3600)
        } else {
            write!(f, "{}d", seconds / 86400)
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use super::*;

    #[test]
    fn test_relative_age_buckets() {
        let now = Timestamp::from_second(1700000000).unwrap();
        let age = |secs: i64| {
            format!(
                "{}",
                RelativeAge {
                    at: now - SignedDuration::from_secs(secs),
                    now,
                }
            )
        };

        assert_eq!(age(42), "42s");
        assert_eq!(age(17 * 60), "17m");
        assert_eq!(age(3 * 3600 + 100), "3h");
        assert_eq!(age(2 * 86400), "2d");
    }
}
