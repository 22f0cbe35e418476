//! Error types for occupancy-types.

use thiserror::Error;

/// Errors that can occur when normalizing a sensor payload.
///
/// A payload that is merely *unrecognized* is not an error: the normalizer
/// returns [`NormalizedEvent::Empty`](crate::NormalizedEvent::Empty) for it.
/// These variants cover payloads that claim a structure and then break it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The body announced itself as JSON but did not parse.
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using occupancy-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Errors from calendar and clock helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CalendarError {
    /// Timezone name is not a known IANA zone.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Month outside 1..=12.
    #[error("Invalid month {0}: expected 1-12")]
    InvalidMonth(u8),

    /// A date window could not be represented.
    #[error("Date out of range: {0}")]
    OutOfRange(String),
}
