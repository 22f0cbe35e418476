//! Application state shared across handlers and the collector.
//!
//! # Reads and writes
//!
//! - **Writes** (webhook deliveries, poll ticks, resets) go through
//!   [`AppState::store`], a `tokio::sync::Mutex<Store>`. Holding the mutex
//!   across the store's immediate transaction keeps the read-modify-write of
//!   the live row serialized.
//! - **Live reads** (`/api/live`, `/api/status`) borrow the last published
//!   [`LiveState`] from a `watch` channel and never touch the writer lock,
//!   except when the snapshot shows a reset is due.
//! - **Stats reads** use a second, read-only SQLite connection when the
//!   database is file-backed, so aggregation queries see a WAL snapshot and
//!   do not queue behind an in-flight append.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use occupancy_store::{IngestOutcome, Store};
use occupancy_types::{CalendarError, LiveState, LocalClock, NormalizedEvent, Normalizer};
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::debug;

use crate::config::{Config, SensorMode};

/// Errors building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Invalid clock configuration: {0}")]
    Clock(#[from] CalendarError),
    #[error("Failed to initialize live state: {0}")]
    Store(#[from] occupancy_store::Error),
}

/// Shared application state.
pub struct AppState {
    /// The single writer.
    pub store: Mutex<Store>,
    /// Read-only connection for statistics queries.
    reader: Option<Mutex<Store>>,
    /// Last committed live state.
    live_tx: watch::Sender<LiveState>,
    /// Configuration.
    pub config: Config,
    /// Sensor-local clock.
    pub clock: LocalClock,
    /// Normalizer for polled sensor responses.
    pub normalizer: Normalizer,
    /// Normalizer for webhook pushes, which only carry deltas.
    pub push_normalizer: Normalizer,
    /// Collector control state.
    pub collector: CollectorState,
}

impl AppState {
    /// Create application state around a single store handle.
    ///
    /// The store gets the configured clock and its live row is initialized
    /// (including a due reset) before the first snapshot is published.
    pub fn new(store: Store, config: Config) -> Result<Arc<Self>, StateError> {
        Self::build(store, None, config)
    }

    /// Create application state with a separate read-only stats connection.
    pub fn with_reader(store: Store, reader: Store, config: Config) -> Result<Arc<Self>, StateError> {
        Self::build(store, Some(reader), config)
    }

    fn build(store: Store, reader: Option<Store>, config: Config) -> Result<Arc<Self>, StateError> {
        let clock = config.clock.local_clock()?;
        let mut store = store.with_clock(clock);
        let live = store.init_live(OffsetDateTime::now_utc())?;
        let (live_tx, _) = watch::channel(live);

        Ok(Arc::new(Self {
            store: Mutex::new(store),
            reader: reader.map(|r| Mutex::new(r.with_clock(clock))),
            live_tx,
            config,
            clock,
            normalizer: Normalizer::default(),
            push_normalizer: Normalizer::push(),
            collector: CollectorState::new(),
        }))
    }

    /// The last published live state, without any reset check.
    pub fn snapshot(&self) -> LiveState {
        self.live_tx.borrow().clone()
    }

    /// Subscribe to live state updates.
    pub fn subscribe_live(&self) -> watch::Receiver<LiveState> {
        self.live_tx.subscribe()
    }

    /// The live state as of `now`.
    ///
    /// With a stats connection the committed row is read from the WAL
    /// snapshot, so changes made by another process (an operator reset from
    /// the CLI) show up without waiting for the next sensor event. Without
    /// one, the last published snapshot is used.
    ///
    /// If the state still belongs to a previous local day, the writer runs
    /// the daily reset first so a quiet sensor never shows yesterday's
    /// counters after midnight.
    pub async fn current_live(&self, now: OffsetDateTime) -> occupancy_store::Result<LiveState> {
        let current = match &self.reader {
            Some(reader) => {
                let stored = reader.lock().await.live()?;
                self.adopt_stored(&stored);
                stored
            }
            None => self.snapshot(),
        };
        if !current.needs_reset(self.clock.today(now)) {
            return Ok(current);
        }

        let mut store = self.store.lock().await;
        if store.check_and_reset(now)?.is_some() {
            debug!("Reset on read at {}", now);
        }
        let state = store.live()?;
        self.publish(state.clone());
        Ok(state)
    }

    /// Apply a normalized event through the writer and publish the result.
    pub async fn ingest(
        &self,
        event: &NormalizedEvent,
        now: OffsetDateTime,
    ) -> occupancy_store::Result<IngestOutcome> {
        let mut store = self.store.lock().await;
        let outcome = store.ingest(event, now)?;
        self.publish(outcome.state.clone());
        Ok(outcome)
    }

    /// Run a read-only query, on the stats connection if there is one.
    pub async fn read<T>(
        &self,
        f: impl FnOnce(&Store) -> occupancy_store::Result<T>,
    ) -> occupancy_store::Result<T> {
        match &self.reader {
            Some(reader) => f(&*reader.lock().await),
            None => f(&*self.store.lock().await),
        }
    }

    /// The normalizer for payloads from a producer in `mode`.
    pub fn normalizer_for(&self, mode: SensorMode) -> &Normalizer {
        match mode {
            SensorMode::Push => &self.push_normalizer,
            SensorMode::Poll => &self.normalizer,
        }
    }

    /// Whether stats queries use a separate connection.
    pub fn has_reader(&self) -> bool {
        self.reader.is_some()
    }

    fn publish(&self, state: LiveState) {
        self.live_tx.send_replace(state);
    }

    /// Replace the snapshot with a row read outside the writer, unless the
    /// writer has already published something newer.
    fn adopt_stored(&self, stored: &LiveState) {
        self.live_tx.send_if_modified(|current| {
            let not_older = stored.last_update >= current.last_update
                && stored.last_reset_date >= current.last_reset_date;
            if not_older && current != stored {
                debug!("Live snapshot refreshed from the database");
                *current = stored.clone();
                true
            } else {
                false
            }
        });
    }
}

/// State for tracking and controlling the poll collector.
pub struct CollectorState {
    /// Whether the collector is currently running.
    running: AtomicBool,
    /// When the collector was started (Unix timestamp).
    started_at: AtomicU64,
    /// Channel to signal the collector to stop.
    stop_tx: watch::Sender<bool>,
    /// Receiver for stop signal (cloned by the collector task).
    stop_rx: watch::Receiver<bool>,
    /// Poll statistics.
    pub stats: RwLock<PollStats>,
}

impl CollectorState {
    /// Create a new collector state.
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            stop_tx,
            stop_rx,
            stats: RwLock::new(PollStats::default()),
        }
    }

    /// Check if the collector is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the collector as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the collector start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        let ts = self.started_at.load(Ordering::SeqCst);
        if ts == 0 {
            None
        } else {
            OffsetDateTime::from_unix_timestamp(ts as i64).ok()
        }
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Signal the collector to stop.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Reset the stop signal (for restarting).
    pub fn reset_stop(&self) {
        let _ = self.stop_tx.send(false);
    }
}

impl Default for CollectorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll collector statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PollStats {
    /// Time of last successful poll.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_poll_at: Option<OffsetDateTime>,
    /// Time of last failed poll.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Total successful polls.
    pub success_count: u64,
    /// Total failed polls.
    pub failure_count: u64,
    /// Endpoint that answered the last successful poll.
    pub last_endpoint: Option<String>,
}

impl PollStats {
    /// Record a successful poll.
    pub fn record_success(&mut self, at: OffsetDateTime, endpoint: &str) {
        self.last_poll_at = Some(at);
        self.success_count += 1;
        self.last_endpoint = Some(endpoint.to_string());
    }

    /// Record a failed poll.
    pub fn record_failure(&mut self, at: OffsetDateTime, error: impl ToString) {
        self.last_error_at = Some(at);
        self.last_error = Some(error.to_string());
        self.failure_count += 1;
    }
}
