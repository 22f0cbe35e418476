//! Core types for live people-counting.
//!
//! This crate holds everything that does not need a database or a network:
//! the live occupancy record and its daily reset arithmetic, the payload
//! normalizer that turns sensor dialects into one canonical event, the
//! sensor-local clock, and the aggregation buckets served by the dashboard.
//!
//! # Example
//!
//! ```
//! use occupancy_types::{LiveState, NormalizedEvent, Normalizer, RawPayload};
//! use time::macros::{date, datetime};
//!
//! let mut state = LiveState::new(date!(2026 - 02 - 10));
//! let event = Normalizer::default()
//!     .normalize(&RawPayload::json(r#"{"in": 12, "out": 5}"#))?;
//!
//! if let NormalizedEvent::Absolute(reading) = event {
//!     state.apply_absolute(reading.count_in, reading.count_out, datetime!(2026-02-10 09:00 UTC));
//! }
//! assert_eq!(state.occupancy, 7);
//! # Ok::<(), occupancy_types::ParseError>(())
//! ```

pub mod clock;
pub mod error;
pub mod formats;
pub mod live;
pub mod normalize;
pub mod stats;

pub use clock::LocalClock;
pub use error::{CalendarError, ParseError, ParseResult};
pub use live::{AbsoluteApply, Counts, LiveState, derive_occupancy};
pub use normalize::{
    AbsoluteReading, Direction, Extractor, JsonCounters, NormalizedEvent, Normalizer, Payload,
    RawPayload, WebhookFrames, XmlTags,
};
pub use stats::{DailyBucket, HourlyBucket, StatsWindow};
