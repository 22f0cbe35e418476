//! Sensor-local calendar.
//!
//! Reset boundaries and statistics buckets follow the wall clock at the
//! sensor's site, including daylight-saving changes, so the zone is an IANA
//! name rather than a fixed offset. Instants stay `time::OffsetDateTime`;
//! `chrono-tz` is only consulted for the offset in effect at an instant.

use std::fmt;

use chrono::{Offset, TimeZone};
use chrono_tz::Tz;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::CalendarError;

/// Converts instants into the sensor's local wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    tz: Tz,
}

impl LocalClock {
    /// Create a clock for an IANA timezone name such as `Europe/Berlin`.
    pub fn new(name: &str) -> Result<Self, CalendarError> {
        name.trim()
            .parse::<Tz>()
            .map(|tz| Self { tz })
            .map_err(|_| CalendarError::UnknownTimezone(name.to_string()))
    }

    /// A clock pinned to UTC.
    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    /// IANA name of the zone.
    pub fn name(&self) -> &'static str {
        self.tz.name()
    }

    /// UTC offset in effect at `instant`.
    pub fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        let seconds = chrono::DateTime::from_timestamp(instant.unix_timestamp(), 0)
            .map(|utc| {
                self.tz
                    .offset_from_utc_datetime(&utc.naive_utc())
                    .fix()
                    .local_minus_utc()
            })
            .unwrap_or(0);
        UtcOffset::from_whole_seconds(seconds).unwrap_or(UtcOffset::UTC)
    }

    /// Local wall time at `instant`.
    pub fn local(&self, instant: OffsetDateTime) -> PrimitiveDateTime {
        let local = instant.to_offset(self.offset_at(instant));
        PrimitiveDateTime::new(local.date(), local.time())
    }

    /// Local calendar date at `instant`.
    pub fn today(&self, instant: OffsetDateTime) -> Date {
        self.local(instant).date()
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for LocalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_unknown_timezone() {
        let err = LocalClock::new("Mars/Olympus_Mons").unwrap_err();
        assert_eq!(err, CalendarError::UnknownTimezone("Mars/Olympus_Mons".to_string()));
    }

    #[test]
    fn test_utc_clock_is_identity() {
        let clock = LocalClock::utc();
        let instant = datetime!(2026-02-10 23:30:00 UTC);
        assert_eq!(clock.local(instant), datetime!(2026-02-10 23:30:00));
    }

    #[test]
    fn test_berlin_crosses_midnight_before_utc() {
        let clock = LocalClock::new("Europe/Berlin").unwrap();
        // 23:30 UTC in winter is 00:30 the next day in Berlin.
        let instant = datetime!(2026-02-10 23:30:00 UTC);
        assert_eq!(clock.today(instant), date!(2026 - 02 - 11));
        assert_eq!(clock.offset_at(instant).whole_hours(), 1);
    }

    #[test]
    fn test_berlin_summer_time() {
        let clock = LocalClock::new("Europe/Berlin").unwrap();
        let instant = datetime!(2026-07-01 12:00:00 UTC);
        assert_eq!(clock.offset_at(instant).whole_hours(), 2);
        assert_eq!(clock.local(instant), datetime!(2026-07-01 14:00:00));
    }

    #[test]
    fn test_display_is_zone_name() {
        let clock = LocalClock::new("Europe/Berlin").unwrap();
        assert_eq!(clock.to_string(), "Europe/Berlin");
    }
}
