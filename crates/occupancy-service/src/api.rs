//! REST API endpoints for the occupancy service.
//!
//! # Concurrency
//!
//! - `/api/live` and `/api/status` read the published live snapshot and do
//!   not wait on the writer. `/api/live` only takes the writer lock when the
//!   snapshot is from a previous local day and a reset is due.
//! - `/api/stats/*` run on the read-only connection when one is configured.
//! - `POST /api/webhook` normalizes the body first and holds the writer lock
//!   only for the state update.
//!
//! ## Error Handling
//!
//! Dashboard endpoints return structured JSON errors via [`AppError`]. The
//! webhook never fails: it always answers 200 with a status field, so a
//! sensor does not retry a payload the service cannot use.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};
use tracing::error;

use occupancy_types::formats::iso_date;
use occupancy_types::{DailyBucket, HourlyBucket, NormalizedEvent, RawPayload};

use crate::config::SensorMode;
use crate::ingest::{IngestError, ingest_payload};
use crate::state::{AppState, PollStats};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Health and status
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        // Live counters
        .route("/api/live", get(get_live))
        // Statistics
        .route("/api/stats/today", get(stats_today))
        .route("/api/stats/week", get(stats_week))
        .route("/api/stats/month", get(stats_current_month))
        .route("/api/stats/month/{year}/{month}", get(stats_month))
        // Push ingestion
        .route("/api/webhook", post(webhook))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Current-period counters.
#[derive(Debug, Serialize)]
pub struct CurrentCounts {
    pub count_in: u64,
    pub count_out: u64,
    pub occupancy: u64,
}

/// Live occupancy response.
#[derive(Debug, Serialize)]
pub struct LiveResponse {
    pub current: CurrentCounts,
    /// Time of the last accepted sensor write.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Live occupancy endpoint.
async fn get_live(State(state): State<Arc<AppState>>) -> Result<Json<LiveResponse>, AppError> {
    let now = OffsetDateTime::now_utc();
    let live = state.current_live(now).await?;

    Ok(Json(LiveResponse {
        current: CurrentCounts {
            count_in: live.count_in,
            count_out: live.count_out,
            occupancy: live.occupancy,
        },
        last_update: live.last_update,
        timestamp: now,
    }))
}

/// Collector status.
#[derive(Debug, Serialize)]
pub struct CollectorStatus {
    /// Whether the collector is running.
    pub running: bool,
    /// When the collector was started (if running).
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub stats: PollStats,
}

/// Sensor status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Whether the sensor wrote within the status window.
    pub sensor_connected: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub mode: SensorMode,
    pub poll_interval: u64,
    pub timezone: &'static str,
    pub collector: CollectorStatus,
}

/// Sensor status endpoint.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let now = OffsetDateTime::now_utc();
    let live = state.snapshot();

    Json(StatusResponse {
        sensor_connected: live.updated_within(now, state.config.server.status_window()),
        last_update: live.last_update,
        timestamp: now,
        mode: state.config.sensor.mode,
        poll_interval: state.config.sensor.poll_interval,
        timezone: state.clock.name(),
        collector: CollectorStatus {
            running: state.collector.is_running(),
            started_at: state.collector.started_at(),
            stats: state.collector.stats.read().await.clone(),
        },
    })
}

/// Hourly statistics for one day.
#[derive(Debug, Serialize)]
pub struct DayStatsResponse {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub hours: Vec<HourlyBucket>,
}

/// Today's hourly statistics.
async fn stats_today(State(state): State<Arc<AppState>>) -> Result<Json<DayStatsResponse>, AppError> {
    let today = state.clock.today(OffsetDateTime::now_utc());
    let hours = state.read(|store| store.hourly_stats(today)).await?;
    Ok(Json(DayStatsResponse { date: today, hours }))
}

/// Daily statistics for the last seven days.
#[derive(Debug, Serialize)]
pub struct WeekStatsResponse {
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date")]
    pub end_date: Date,
    pub days: Vec<DailyBucket>,
}

/// Statistics for the seven days ending today.
async fn stats_week(State(state): State<Arc<AppState>>) -> Result<Json<WeekStatsResponse>, AppError> {
    let today = state.clock.today(OffsetDateTime::now_utc());
    let start = today
        .checked_sub(Duration::days(6))
        .ok_or_else(|| AppError::Internal(format!("No week window before {}", today)))?;
    let days = state.read(|store| store.daily_stats(start, 7)).await?;

    Ok(Json(WeekStatsResponse {
        start_date: start,
        end_date: today,
        days,
    }))
}

/// Daily statistics for a calendar month.
#[derive(Debug, Serialize)]
pub struct MonthStatsResponse {
    pub year: i32,
    pub month: u8,
    pub days: Vec<DailyBucket>,
}

/// Statistics for the current month.
async fn stats_current_month(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MonthStatsResponse>, AppError> {
    let today = state.clock.today(OffsetDateTime::now_utc());
    month_stats(&state, today.year(), u8::from(today.month())).await
}

/// Statistics for a given month.
async fn stats_month(
    State(state): State<Arc<AppState>>,
    Path((year, month)): Path<(i32, u8)>,
) -> Result<Json<MonthStatsResponse>, AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::BadRequest(format!(
            "Invalid month {}: must be 1-12",
            month
        )));
    }
    if !state.config.stats.allows_year(year) {
        return Err(AppError::BadRequest(format!(
            "Year {} out of range: must be {}-{}",
            year, state.config.stats.min_year, state.config.stats.max_year
        )));
    }
    month_stats(&state, year, month).await
}

async fn month_stats(
    state: &AppState,
    year: i32,
    month: u8,
) -> Result<Json<MonthStatsResponse>, AppError> {
    let days = state
        .read(|store| store.monthly_stats(year, month))
        .await?;
    Ok(Json(MonthStatsResponse { year, month, days }))
}

/// Acknowledgment returned to the sensor.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// `ok`, `ignored` or `error`.
    pub status: &'static str,
    pub in_delta: Option<u64>,
    pub out_delta: Option<u64>,
    pub occupancy: Option<u64>,
    pub message: Option<String>,
}

impl WebhookAck {
    fn ignored(message: impl Into<String>) -> Self {
        Self {
            status: "ignored",
            in_delta: None,
            out_delta: None,
            occupancy: None,
            message: Some(message.into()),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            ..Self::ignored(message)
        }
    }
}

/// Push ingestion endpoint.
async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookAck> {
    if state.config.sensor.mode != SensorMode::Push {
        return Json(WebhookAck::ignored("sensor is configured for poll mode"));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body = String::from_utf8_lossy(&body);
    let raw = RawPayload::new(content_type, &body);

    let ack = match ingest_payload(&state, SensorMode::Push, raw, OffsetDateTime::now_utc()).await {
        Ok(ingested) => match ingested.event {
            NormalizedEvent::Empty => WebhookAck::ignored("unrecognized payload"),
            event => {
                let (in_delta, out_delta) = match event {
                    NormalizedEvent::Delta {
                        in_delta,
                        out_delta,
                    } => (Some(in_delta), Some(out_delta)),
                    _ => (None, None),
                };
                WebhookAck {
                    status: "ok",
                    in_delta,
                    out_delta,
                    occupancy: Some(ingested.outcome.state.occupancy),
                    message: ingested.source.map(str::to_string),
                }
            }
        },
        Err(IngestError::Parse(e)) => WebhookAck::error(e.to_string()),
        Err(IngestError::Store(e)) => {
            error!("Failed to store webhook event: {}", e);
            WebhookAck::error("failed to store event")
        }
    };

    Json(ack)
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Store(occupancy_store::Error),
    Internal(String),
}

impl From<occupancy_store::Error> for AppError {
    fn from(e: occupancy_store::Error) -> Self {
        match e {
            occupancy_store::Error::InvalidRange(msg) => AppError::BadRequest(msg),
            e => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
