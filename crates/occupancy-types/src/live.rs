//! Live occupancy state and the daily reset arithmetic.
//!
//! [`LiveState`] is the single record of current truth. Every mutation goes
//! through one of the methods here so that `occupancy` is always re-derived
//! from the counters that were just written, and the daily rebase keeps
//! lifetime totals recoverable as `base + count`.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::formats;

/// Entries and exits counted since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Counts {
    /// Entries.
    pub count_in: u64,
    /// Exits.
    pub count_out: u64,
}

impl Counts {
    /// Create a counter pair.
    pub fn new(count_in: u64, count_out: u64) -> Self {
        Self {
            count_in,
            count_out,
        }
    }

    /// Occupancy for this pair, clamped at zero.
    pub fn occupancy(&self) -> u64 {
        derive_occupancy(self.count_in, self.count_out)
    }
}

/// Derive occupancy from entry and exit counters.
///
/// More exits than entries (a missed entry at the door, or counters that
/// drifted across a reset) clamp to zero instead of going negative.
#[inline]
pub fn derive_occupancy(count_in: u64, count_out: u64) -> u64 {
    count_in.saturating_sub(count_out)
}

/// The singleton live record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LiveState {
    /// Entries since the last reset.
    pub count_in: u64,
    /// Exits since the last reset.
    pub count_out: u64,
    /// `max(0, count_in - count_out)`, recomputed on every write.
    pub occupancy: u64,
    /// Entries accumulated across all previous reset periods.
    pub base_in: u64,
    /// Exits accumulated across all previous reset periods.
    pub base_out: u64,
    /// Time of the most recent accepted write.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    /// Sensor-local calendar date of the last reset. `None` before first initialization.
    #[serde(with = "formats::iso_date::option")]
    pub last_reset_date: Option<Date>,
}

/// Outcome of applying an absolute sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsoluteApply {
    /// Reading was at or above the base offsets.
    Applied,
    /// Reading was below a base offset (sensor counter restarted) and the base was re-anchored.
    Regressed,
}

impl LiveState {
    /// A freshly initialized state anchored at `today`.
    pub fn new(today: Date) -> Self {
        Self {
            last_reset_date: Some(today),
            ..Self::default()
        }
    }

    /// Current-period counters.
    pub fn counts(&self) -> Counts {
        Counts::new(self.count_in, self.count_out)
    }

    /// Lifetime entries (all reset periods).
    pub fn lifetime_in(&self) -> u64 {
        self.base_in.saturating_add(self.count_in)
    }

    /// Lifetime exits (all reset periods).
    pub fn lifetime_out(&self) -> u64 {
        self.base_out.saturating_add(self.count_out)
    }

    /// Overwrite the current-period counters and re-derive occupancy.
    pub fn apply(&mut self, count_in: u64, count_out: u64, now: OffsetDateTime) {
        self.count_in = count_in;
        self.count_out = count_out;
        self.occupancy = derive_occupancy(count_in, count_out);
        self.last_update = Some(now);
    }

    /// Add a batch of new crossings.
    pub fn apply_delta(&mut self, in_delta: u64, out_delta: u64, now: OffsetDateTime) {
        let count_in = self.count_in.saturating_add(in_delta);
        let count_out = self.count_out.saturating_add(out_delta);
        self.apply(count_in, count_out, now);
    }

    /// Apply cumulative sensor counters, re-based against the base offsets.
    ///
    /// The sensor reports totals since its own boot; the current-period value
    /// is `absolute - base`. A reading below the base means the sensor's
    /// counter restarted. The base is then re-anchored to the reading so the
    /// current-period counts carry on from where they were (or from the
    /// reading, if that is lower) and later readings count up again.
    pub fn apply_absolute(
        &mut self,
        absolute_in: u64,
        absolute_out: u64,
        now: OffsetDateTime,
    ) -> AbsoluteApply {
        let outcome = if absolute_in < self.base_in || absolute_out < self.base_out {
            self.base_in = absolute_in.saturating_sub(self.count_in);
            self.base_out = absolute_out.saturating_sub(self.count_out);
            AbsoluteApply::Regressed
        } else {
            AbsoluteApply::Applied
        };
        self.apply(
            absolute_in.saturating_sub(self.base_in),
            absolute_out.saturating_sub(self.base_out),
            now,
        );
        outcome
    }

    /// Whether a reset boundary has been crossed since the last recorded reset.
    pub fn needs_reset(&self, today: Date) -> bool {
        self.last_reset_date != Some(today)
    }

    /// Roll the current-period counters into the base offsets and zero them.
    ///
    /// `last_update` is left alone: a reset is not a sensor write.
    pub fn rebase(&mut self, today: Date) {
        self.base_in = self.base_in.saturating_add(self.count_in);
        self.base_out = self.base_out.saturating_add(self.count_out);
        self.count_in = 0;
        self.count_out = 0;
        self.occupancy = 0;
        self.last_reset_date = Some(today);
    }

    /// Daily reset policy: rebase if `today` differs from the last reset date.
    ///
    /// Returns `true` if a reset happened. A second call on the same date is a
    /// no-op. Days skipped while offline are not backfilled; the anchor jumps
    /// straight to `today`.
    pub fn check_and_reset(&mut self, today: Date) -> bool {
        if !self.needs_reset(today) {
            return false;
        }
        self.rebase(today);
        true
    }

    /// True if `last_update` is within `window` of `now`.
    pub fn updated_within(&self, now: OffsetDateTime, window: time::Duration) -> bool {
        self.last_update
            .is_some_and(|t| now - t <= window && t - now <= window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    const NOW: OffsetDateTime = datetime!(2026-02-10 09:15:00 UTC);

    #[test]
    fn test_new_state_is_anchored() {
        let state = LiveState::new(date!(2026 - 02 - 10));
        assert_eq!(state.last_reset_date, Some(date!(2026 - 02 - 10)));
        assert_eq!(state.counts(), Counts::default());
        assert!(state.last_update.is_none());
    }

    #[test]
    fn test_apply_delta_derives_occupancy() {
        let mut state = LiveState::new(date!(2026 - 02 - 10));
        state.apply_delta(3, 1, NOW);
        assert_eq!(state.occupancy, 2);
        state.apply_delta(0, 5, NOW);
        assert_eq!(state.count_out, 6);
        assert_eq!(state.occupancy, 0);
        assert_eq!(state.last_update, Some(NOW));
    }

    #[test]
    fn test_reset_rolls_counts_into_base() {
        let mut state = LiveState {
            count_in: 50,
            count_out: 30,
            occupancy: 20,
            base_in: 100,
            base_out: 80,
            last_update: Some(NOW),
            last_reset_date: Some(date!(2026 - 02 - 09)),
        };

        assert!(state.check_and_reset(date!(2026 - 02 - 10)));
        assert_eq!(state.base_in, 150);
        assert_eq!(state.base_out, 110);
        assert_eq!(state.count_in, 0);
        assert_eq!(state.count_out, 0);
        assert_eq!(state.occupancy, 0);
        assert_eq!(state.last_reset_date, Some(date!(2026 - 02 - 10)));
        assert_eq!(state.last_update, Some(NOW));
    }

    #[test]
    fn test_reset_is_idempotent_within_a_day() {
        let mut state = LiveState::new(date!(2026 - 02 - 09));
        state.apply_delta(7, 2, NOW);

        assert!(state.check_and_reset(date!(2026 - 02 - 10)));
        let after_first = state.clone();
        assert!(!state.check_and_reset(date!(2026 - 02 - 10)));
        assert_eq!(state, after_first);
    }

    #[test]
    fn test_reset_from_uninitialized() {
        let mut state = LiveState::default();
        assert!(state.needs_reset(date!(2026 - 02 - 10)));
        assert!(state.check_and_reset(date!(2026 - 02 - 10)));
        assert_eq!(state.base_in, 0);
        assert_eq!(state.last_reset_date, Some(date!(2026 - 02 - 10)));
    }

    #[test]
    fn test_offline_gap_jumps_to_today() {
        let mut state = LiveState::new(date!(2026 - 02 - 01));
        state.apply_delta(10, 4, NOW);
        assert!(state.check_and_reset(date!(2026 - 02 - 10)));
        assert_eq!(state.last_reset_date, Some(date!(2026 - 02 - 10)));
        assert_eq!(state.base_in, 10);
    }

    #[test]
    fn test_absolute_reading_is_rebased() {
        let mut state = LiveState::new(date!(2026 - 02 - 10));
        state.base_in = 1_000;
        state.base_out = 990;

        let outcome = state.apply_absolute(1_012, 995, NOW);
        assert_eq!(outcome, AbsoluteApply::Applied);
        assert_eq!(state.count_in, 12);
        assert_eq!(state.count_out, 5);
        assert_eq!(state.occupancy, 7);
        assert_eq!(state.lifetime_in(), 1_012);
    }

    #[test]
    fn test_absolute_reading_below_base_reanchors() {
        let mut state = LiveState::new(date!(2026 - 02 - 10));
        state.base_in = 500;
        state.base_out = 480;

        let outcome = state.apply_absolute(3, 1, NOW);
        assert_eq!(outcome, AbsoluteApply::Regressed);
        assert_eq!(state.count_in, 0);
        assert_eq!(state.count_out, 0);
        assert_eq!(state.occupancy, 0);
        assert_eq!((state.base_in, state.base_out), (3, 1));

        // Counting continues from the re-anchored base
        let outcome = state.apply_absolute(9, 2, NOW);
        assert_eq!(outcome, AbsoluteApply::Applied);
        assert_eq!(state.count_in, 6);
        assert_eq!(state.count_out, 1);
    }

    #[test]
    fn test_updated_within_window() {
        let mut state = LiveState::new(date!(2026 - 02 - 10));
        assert!(!state.updated_within(NOW, time::Duration::minutes(5)));

        state.apply_delta(1, 0, NOW - time::Duration::minutes(4));
        assert!(state.updated_within(NOW, time::Duration::minutes(5)));
        assert!(!state.updated_within(NOW + time::Duration::minutes(2), time::Duration::minutes(5)));
    }

    #[test]
    fn test_live_state_serialization() {
        let mut state = LiveState::new(date!(2026 - 02 - 10));
        state.apply_delta(4, 1, NOW);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["occupancy"], 3);
        assert_eq!(json["last_reset_date"], "2026-02-10");
        assert!(json["last_update"].as_str().unwrap().starts_with("2026-02-10T09:15:00"));

        let back: LiveState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::{date, datetime};

    proptest! {
        /// Occupancy always matches the clamped difference after any delta sequence.
        #[test]
        fn occupancy_tracks_counters(deltas in proptest::collection::vec((0u64..1_000, 0u64..1_000), 0..64)) {
            let now = datetime!(2026-02-10 12:00:00 UTC);
            let mut state = LiveState::new(date!(2026 - 02 - 10));
            for (in_delta, out_delta) in deltas {
                state.apply_delta(in_delta, out_delta, now);
                prop_assert_eq!(state.occupancy, state.count_in.saturating_sub(state.count_out));
            }
        }

        /// A reset never loses lifetime totals.
        #[test]
        fn reset_preserves_lifetime_totals(
            count_in in 0u64..1_000_000,
            count_out in 0u64..1_000_000,
            base_in in 0u64..1_000_000,
            base_out in 0u64..1_000_000,
        ) {
            let mut state = LiveState {
                count_in,
                count_out,
                occupancy: derive_occupancy(count_in, count_out),
                base_in,
                base_out,
                last_update: None,
                last_reset_date: Some(date!(2026 - 02 - 09)),
            };
            let lifetime = (state.lifetime_in(), state.lifetime_out());
            state.check_and_reset(date!(2026 - 02 - 10));
            prop_assert_eq!((state.lifetime_in(), state.lifetime_out()), lifetime);
            prop_assert_eq!(state.occupancy, 0);
        }
    }
}
