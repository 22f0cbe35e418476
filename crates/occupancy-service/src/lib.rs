//! Sensor ingestion and dashboard REST API for a live people counter.
//!
//! This crate provides a service that:
//! - Accepts count events pushed by the sensor (`POST /api/webhook`), or
//!   polls the sensor's live-count endpoints on a schedule
//! - Keeps the live in/out/occupancy counters in the local database,
//!   resetting them at local midnight
//! - Appends deduplicated snapshots to the count history
//! - Exposes a REST API for the dashboard
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/live` - Current counters and occupancy
//! - `GET /api/status` - Sensor connectivity and collector stats
//! - `GET /api/stats/today` - Hourly maxima for today
//! - `GET /api/stats/week` - Daily maxima for the last seven days
//! - `GET /api/stats/month` - Daily maxima for the current month
//! - `GET /api/stats/month/{year}/{month}` - Daily maxima for a given month
//! - `POST /api/webhook` - Push ingestion
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/occupancy/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [sensor]
//! mode = "poll"
//! base_url = "http://10.13.1.165:80"
//! username = "admin"
//! password = "pass"
//! poll_interval = 60
//!
//! [clock]
//! timezone = "Europe/Berlin"
//! ```

pub mod api;
pub mod collector;
pub mod config;
pub mod ingest;
pub mod sensor;
pub mod state;

pub use collector::{Collector, CollectorError};
pub use config::{
    ClockConfig, Config, ConfigError, RepairConfig, SensorConfig, SensorMode, ServerConfig,
    StatsConfig, StorageConfig, ValidationError,
};
pub use ingest::{IngestError, Ingested, ingest_payload};
pub use sensor::{SensorClient, SensorError, SensorResponse};
pub use state::{AppState, CollectorState, PollStats, StateError};
