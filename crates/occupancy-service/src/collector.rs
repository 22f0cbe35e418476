//! Background poll collector.
//!
//! In poll mode the service asks the sensor for its cumulative counters on
//! a fixed interval. A failed tick is logged and leaves the live state
//! untouched; the next tick tries again.

use std::sync::Arc;
use std::time::Duration;

use occupancy_types::{ParseError, RawPayload};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::config::SensorMode;
use crate::ingest::{IngestError, Ingested, ingest_payload};
use crate::sensor::{SensorClient, SensorError};
use crate::state::AppState;

/// Background collector that polls the sensor on the configured interval.
pub struct Collector {
    state: Arc<AppState>,
}

impl Collector {
    /// Create a new collector.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Start polling in the background.
    ///
    /// Returns `None` without spawning anything when the sensor is in push
    /// mode or the HTTP client cannot be built.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let sensor = &self.state.config.sensor;
        if sensor.mode != SensorMode::Poll {
            info!("Sensor mode is {}, collector not started", sensor.mode);
            return None;
        }

        let client = match SensorClient::new(sensor) {
            Ok(client) => client,
            Err(e) => {
                error!("Cannot start collector: {}", e);
                return None;
            }
        };

        info!(
            "Starting collector for {} (interval: {}s, {} endpoint(s))",
            sensor.base_url,
            sensor.poll_interval,
            client.urls().len()
        );

        self.state.collector.reset_stop();
        self.state.collector.set_running(true);

        let state = Arc::clone(&self.state);
        Some(tokio::spawn(async move {
            collect(state, client).await;
        }))
    }
}

async fn collect(state: Arc<AppState>, client: SensorClient) {
    let mut stop_rx = state.collector.subscribe_stop();
    let mut interval_timer = interval(Duration::from_secs(state.config.sensor.poll_interval));
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    loop {
        if *stop_rx.borrow() {
            break;
        }

        // The first tick completes immediately
        tokio::select! {
            _ = interval_timer.tick() => {}
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        let now = OffsetDateTime::now_utc();
        match poll_once(&state, &client, now).await {
            Ok((url, ingested)) => {
                consecutive_failures = 0;
                debug!(
                    "Polled {}: in={} out={} occupancy={}",
                    url,
                    ingested.outcome.state.count_in,
                    ingested.outcome.state.count_out,
                    ingested.outcome.state.occupancy
                );
                state.collector.stats.write().await.record_success(now, &url);
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures <= 3 {
                    if let CollectorError::Transport(ref sensor_error) = e
                        && sensor_error.is_timeout()
                    {
                        warn!(
                            "Sensor did not answer within {}s (attempt {})",
                            state.config.sensor.timeout_secs, consecutive_failures
                        );
                    } else {
                        warn!("Failed to poll sensor: {} (attempt {})", e, consecutive_failures);
                    }
                } else if consecutive_failures == 4 {
                    error!(
                        "Failed to poll sensor after {} attempts, will continue trying silently",
                        consecutive_failures
                    );
                }
                state.collector.stats.write().await.record_failure(now, &e);
            }
        }
    }

    state.collector.set_running(false);
    info!("Collector stopped");
}

/// Fetch the sensor's counters once and apply them.
///
/// Endpoints are tried in order until one answers with a payload the poll
/// normalizer recognizes. If every answer is unrecognized, the first one is
/// ingested anyway so it gets logged and a due reset still runs. Returns the
/// URL that answered. The writer lock is only taken after the response has
/// been received and normalized.
pub async fn poll_once(
    state: &AppState,
    client: &SensorClient,
    now: OffsetDateTime,
) -> Result<(String, Ingested), CollectorError> {
    let normalizer = state.normalizer_for(SensorMode::Poll);
    let (response, recognized) = client
        .fetch_recognized(|response| {
            let raw = RawPayload::new(response.content_type.as_deref(), &response.body);
            normalizer.normalize_with_source(&raw).ok().flatten()
        })
        .await?;

    let ingested = match recognized {
        Some((source, event)) => {
            debug!("Payload recognized by {}: {:?}", source, event);
            let outcome = state.ingest(&event, now).await.map_err(CollectorError::Store)?;
            Ingested {
                source: Some(source),
                event,
                outcome,
            }
        }
        None => {
            let raw = RawPayload::new(response.content_type.as_deref(), &response.body);
            ingest_payload(state, SensorMode::Poll, raw, now).await?
        }
    };
    Ok((response.url, ingested))
}

/// Collector errors.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Sensor request failed: {0}")]
    Transport(SensorError),
    #[error("Sensor returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Failed to parse sensor response: {0}")]
    Parse(ParseError),
    #[error("Failed to store: {0}")]
    Store(occupancy_store::Error),
}

impl From<SensorError> for CollectorError {
    fn from(e: SensorError) -> Self {
        match e {
            SensorError::Status { url, status } => CollectorError::Status { url, status },
            other => CollectorError::Transport(other),
        }
    }
}

impl From<IngestError> for CollectorError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Parse(e) => CollectorError::Parse(e),
            IngestError::Store(e) => CollectorError::Store(e),
        }
    }
}
