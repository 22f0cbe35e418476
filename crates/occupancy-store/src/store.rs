//! Main store implementation: connections and the live state row.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};

use occupancy_types::formats::{format_date, parse_date};
use occupancy_types::{AbsoluteApply, LiveState, LocalClock, NormalizedEvent};

use crate::error::{Error, Result};
use crate::history::DedupCache;
use crate::models::{IngestOutcome, ResetReport};
use crate::schema;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store for live state and count history.
///
/// A `Store` is the single writer for one database: every mutation of the
/// live row runs inside an immediate transaction, and the history dedup
/// cache lives here so that resets can clear it. Dashboards that only read
/// statistics can use a second connection from [`Store::open_read_only`].
pub struct Store {
    pub(crate) conn: Connection,
    pub(crate) clock: LocalClock,
    pub(crate) dedup: DedupCache,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL lets the read-only stats connection see a consistent snapshot
        // while the writer appends.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Open an existing database for queries only.
    ///
    /// The schema is not touched; any write through this handle fails.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening read-only database at {}", path.display());
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            clock: LocalClock::default(),
            dedup: DedupCache::new(),
        }
    }

    /// Use `clock` for reset boundaries and history timestamps.
    pub fn with_clock(mut self, clock: LocalClock) -> Self {
        self.clock = clock;
        self
    }

    /// The clock used for reset boundaries and history timestamps.
    pub fn clock(&self) -> &LocalClock {
        &self.clock
    }
}

// Live state operations
impl Store {
    /// Read the live state.
    ///
    /// Before the first initialization this is `LiveState::default()`, whose
    /// missing reset date forces a reset on the next check.
    pub fn live(&self) -> Result<LiveState> {
        read_live(&self.conn)
    }

    /// Initialize the live row if needed and run the reset check.
    ///
    /// Called once at startup so the singleton exists with today's date
    /// before the first producer event arrives.
    pub fn init_live(&mut self, now: OffsetDateTime) -> Result<LiveState> {
        match self.check_and_reset(now)? {
            Some(report) => Ok(report.after),
            None => self.live(),
        }
    }

    /// Overwrite the current-period counters.
    pub fn apply(&mut self, count_in: u64, count_out: u64, now: OffsetDateTime) -> Result<LiveState> {
        self.modify_live(|state| state.apply(count_in, count_out, now))
    }

    /// Add new crossings to the current-period counters.
    pub fn apply_delta(
        &mut self,
        in_delta: u64,
        out_delta: u64,
        now: OffsetDateTime,
    ) -> Result<LiveState> {
        self.modify_live(|state| state.apply_delta(in_delta, out_delta, now))
    }

    fn modify_live(&mut self, f: impl FnOnce(&mut LiveState)) -> Result<LiveState> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut state = read_live(&tx)?;
        f(&mut state);
        write_live(&tx, &state)?;
        tx.commit()?;
        Ok(state)
    }

    /// Daily reset policy.
    ///
    /// Rebases the counters if the local date at `now` differs from the last
    /// reset date, and clears the history dedup cache so the next snapshot is
    /// always recorded. Returns `None` when no reset was due.
    pub fn check_and_reset(&mut self, now: OffsetDateTime) -> Result<Option<ResetReport>> {
        let today = self.clock.today(now);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut state = read_live(&tx)?;
        let report = reset_if_due(&mut state, today);
        if report.is_some() {
            write_live(&tx, &state)?;
        }
        tx.commit()?;

        if let Some(report) = &report {
            self.dedup.clear();
            log_reset(report);
        }
        Ok(report)
    }

    /// Apply a normalized producer event.
    ///
    /// In one transaction: run the reset check, apply the event and write the
    /// live row. After the commit the new counters go through the history
    /// dedup cache. An [`NormalizedEvent::Empty`] event changes nothing
    /// beyond a due reset.
    pub fn ingest(&mut self, event: &NormalizedEvent, now: OffsetDateTime) -> Result<IngestOutcome> {
        let today = self.clock.today(now);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut state = read_live(&tx)?;
        let reset = reset_if_due(&mut state, today);

        let mut regressed = false;
        match *event {
            NormalizedEvent::Delta {
                in_delta,
                out_delta,
            } => state.apply_delta(in_delta, out_delta, now),
            NormalizedEvent::Absolute(reading) => {
                let (old_in, old_out) = (state.base_in, state.base_out);
                if state.apply_absolute(reading.count_in, reading.count_out, now)
                    == AbsoluteApply::Regressed
                {
                    regressed = true;
                    warn!(
                        "Sensor counters {}/{} are below base {}/{}; counter restart assumed, base re-anchored to {}/{}",
                        reading.count_in,
                        reading.count_out,
                        old_in,
                        old_out,
                        state.base_in,
                        state.base_out
                    );
                }
            }
            NormalizedEvent::Empty => {}
        }

        if state.count_out > state.count_in {
            debug!(
                "Exits exceed entries ({} > {}), occupancy clamped to 0",
                state.count_out, state.count_in
            );
        }

        let changed = reset.is_some() || !event.is_empty();
        if changed {
            write_live(&tx, &state)?;
        }
        tx.commit()?;

        if let Some(report) = &reset {
            self.dedup.clear();
            log_reset(report);
        }

        let recorded = if changed {
            let at = self.clock.local(now);
            self.append_if_changed(state.count_in, state.count_out, state.occupancy, at)?
        } else {
            false
        };

        Ok(IngestOutcome {
            state,
            reset,
            recorded,
            regressed,
        })
    }
}

fn reset_if_due(state: &mut LiveState, today: Date) -> Option<ResetReport> {
    let before = state.clone();
    state.check_and_reset(today).then(|| ResetReport {
        before,
        after: state.clone(),
    })
}

fn log_reset(report: &ResetReport) {
    info!(
        "Daily reset: {} -> {} (in {} out {} rolled into base {}/{})",
        report
            .before
            .last_reset_date
            .map(format_date)
            .unwrap_or_else(|| "uninitialized".to_string()),
        report
            .after
            .last_reset_date
            .map(format_date)
            .unwrap_or_default(),
        report.before.count_in,
        report.before.count_out,
        report.after.base_in,
        report.after.base_out,
    );
}

pub(crate) fn read_live(conn: &Connection) -> Result<LiveState> {
    let row = conn
        .query_row(
            "SELECT count_in, count_out, occupancy, base_in, base_out, last_update, last_reset_date
             FROM live WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, u64>(3)?,
                    row.get::<_, u64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((count_in, count_out, occupancy, base_in, base_out, last_update, last_reset_date)) =
        row
    else {
        return Ok(LiveState::default());
    };

    let last_update = last_update
        .map(|s| {
            OffsetDateTime::parse(&s, &Rfc3339)
                .map_err(|e| Error::InvalidTimestamp(format!("live.last_update {s:?}: {e}")))
        })
        .transpose()?;
    let last_reset_date = last_reset_date
        .map(|s| {
            parse_date(&s)
                .map_err(|e| Error::InvalidTimestamp(format!("live.last_reset_date {s:?}: {e}")))
        })
        .transpose()?;

    Ok(LiveState {
        count_in,
        count_out,
        occupancy,
        base_in,
        base_out,
        last_update,
        last_reset_date,
    })
}

pub(crate) fn write_live(conn: &Connection, state: &LiveState) -> Result<()> {
    let last_update = state
        .last_update
        .map(|t| {
            t.format(&Rfc3339)
                .map_err(|e| Error::InvalidTimestamp(e.to_string()))
        })
        .transpose()?;
    let last_reset_date = state.last_reset_date.map(format_date);

    conn.execute(
        "INSERT INTO live (id, count_in, count_out, occupancy, base_in, base_out,
                           last_update, last_reset_date)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            count_in = excluded.count_in,
            count_out = excluded.count_out,
            occupancy = excluded.occupancy,
            base_in = excluded.base_in,
            base_out = excluded.base_out,
            last_update = excluded.last_update,
            last_reset_date = excluded.last_reset_date",
        rusqlite::params![
            state.count_in,
            state.count_out,
            state.occupancy,
            state.base_in,
            state.base_out,
            last_update,
            last_reset_date,
        ],
    )?;

    Ok(())
}
