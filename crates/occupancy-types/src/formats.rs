//! Text formats shared by storage, the API and the CLI.
//!
//! Persisted timestamps are sensor-local wall time (`YYYY-MM-DD HH:MM:SS`)
//! so that lexical order equals chronological order and SQLite's `date()`
//! and `strftime('%H')` bucket by local calendar date and hour.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

/// `YYYY-MM-DD`.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// `YYYY-MM-DD HH:MM:SS`, local wall time.
pub const WALL_CLOCK_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    // Four-digit years cannot fail to format.
    date.format(DATE_FORMAT).unwrap_or_default()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<Date, time::error::Parse> {
    Date::parse(s.trim(), DATE_FORMAT)
}

/// Format a wall-clock timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_wall_clock(ts: PrimitiveDateTime) -> String {
    ts.format(WALL_CLOCK_FORMAT).unwrap_or_default()
}

/// Parse a `YYYY-MM-DD HH:MM:SS` wall-clock timestamp.
pub fn parse_wall_clock(s: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(s.trim(), WALL_CLOCK_FORMAT)
}

/// Serde adapter for `YYYY-MM-DD` dates.
pub mod iso_date {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).map_err(D::Error::custom)
    }

    /// Serde adapter for optional `YYYY-MM-DD` dates.
    pub mod option {
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => serializer.serialize_some(&super::super::format_date(*d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| super::super::parse_date(&s).map_err(D::Error::custom))
                .transpose()
        }
    }
}

/// Serde adapter for `YYYY-MM-DD HH:MM:SS` wall-clock timestamps.
pub mod wall_clock {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::PrimitiveDateTime;

    pub fn serialize<S: Serializer>(
        ts: &PrimitiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_wall_clock(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<PrimitiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_wall_clock(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_wall_clock_format_sorts_lexically() {
        let a = format_wall_clock(datetime!(2026-02-09 23:59:59));
        let b = format_wall_clock(datetime!(2026-02-10 00:00:00));
        assert_eq!(a, "2026-02-09 23:59:59");
        assert!(a < b);
    }

    #[test]
    fn test_parse_date_trims() {
        assert_eq!(parse_date(" 2026-12-01 ").unwrap(), date!(2026 - 12 - 01));
        assert!(parse_date("01.12.2026").is_err());
    }

    #[test]
    fn test_parse_wall_clock() {
        assert_eq!(
            parse_wall_clock("2026-02-10 08:45:00").unwrap(),
            datetime!(2026-02-10 08:45:00)
        );
    }
}
