//! Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use occupancy_types::{CalendarError, LocalClock};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Sensor ingestion settings.
    pub sensor: SensorConfig,
    /// Local calendar settings.
    pub clock: ClockConfig,
    /// Statistics API limits.
    pub stats: StatsConfig,
    /// Correction tool settings.
    pub repair: RepairConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Load from `path` if given, otherwise from the default location.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// # Example
    ///
    /// ```
    /// use occupancy_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.sensor.validate());
        errors.extend(self.clock.validate());
        errors.extend(self.stats.validate());
        errors.extend(self.repair.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind: String,
    /// A sensor counts as connected if it wrote within this many seconds.
    pub status_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            status_window_secs: 300,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new(
                "server.bind",
                "bind address cannot be empty",
            ));
        } else {
            match self.bind.rsplit_once(':') {
                None => errors.push(ValidationError::new(
                    "server.bind",
                    format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                )),
                Some((_, port)) => match port.parse::<u16>() {
                    Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
                    Err(_) => errors.push(ValidationError::new(
                        "server.bind",
                        format!("invalid port '{}': must be a number 1-65535", port),
                    )),
                    Ok(_) => {}
                },
            }
        }

        if self.status_window_secs == 0 {
            errors.push(ValidationError::new(
                "server.status_window_secs",
                "status window must be at least 1 second",
            ));
        }

        errors
    }

    /// The sensor recency window.
    pub fn status_window(&self) -> time::Duration {
        time::Duration::seconds(i64::try_from(self.status_window_secs).unwrap_or(i64::MAX))
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: occupancy_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }

        errors
    }
}

/// How counts reach the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorMode {
    /// The sensor pushes events to `POST /api/webhook`.
    #[default]
    Push,
    /// The service polls the sensor for cumulative counters.
    Poll,
}

impl std::fmt::Display for SensorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorMode::Push => f.write_str("push"),
            SensorMode::Poll => f.write_str("poll"),
        }
    }
}

/// Minimum poll interval in seconds.
pub const MIN_POLL_INTERVAL: u64 = 10;
/// Maximum poll interval in seconds (1 hour).
pub const MAX_POLL_INTERVAL: u64 = 3600;
/// Maximum sensor request timeout in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 60;

/// Sensor ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Producer mode.
    pub mode: SensorMode,
    /// Sensor base URL, used in poll mode.
    pub base_url: String,
    /// Basic auth user.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Live-count endpoints tried in order until one answers.
    pub endpoints: Vec<String>,
    /// Poll interval in seconds.
    pub poll_interval: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            mode: SensorMode::Push,
            base_url: "http://10.13.1.165:80".to_string(),
            username: None,
            password: None,
            endpoints: [
                "/api/v5/live",
                "/api/v5/counts",
                "/api/v5/occupancy",
                "/api/counts",
                "/counts",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            poll_interval: 60,
            timeout_secs: 10,
        }
    }
}

impl SensorConfig {
    /// Validate sensor configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.poll_interval < MIN_POLL_INTERVAL {
            errors.push(ValidationError::new(
                "sensor.poll_interval",
                format!(
                    "poll interval {} is too short (minimum {} seconds)",
                    self.poll_interval, MIN_POLL_INTERVAL
                ),
            ));
        } else if self.poll_interval > MAX_POLL_INTERVAL {
            errors.push(ValidationError::new(
                "sensor.poll_interval",
                format!(
                    "poll interval {} is too long (maximum {} seconds / 1 hour)",
                    self.poll_interval, MAX_POLL_INTERVAL
                ),
            ));
        }

        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            errors.push(ValidationError::new(
                "sensor.timeout_secs",
                format!(
                    "timeout {} is out of range (1-{} seconds)",
                    self.timeout_secs, MAX_TIMEOUT_SECS
                ),
            ));
        }

        if self.mode == SensorMode::Poll {
            if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
                errors.push(ValidationError::new(
                    "sensor.base_url",
                    format!(
                        "base URL '{}' must start with http:// or https://",
                        self.base_url
                    ),
                ));
            }
            if self.endpoints.is_empty() {
                errors.push(ValidationError::new(
                    "sensor.endpoints",
                    "at least one endpoint is required in poll mode",
                ));
            }
            for (i, endpoint) in self.endpoints.iter().enumerate() {
                if !endpoint.starts_with('/') {
                    errors.push(ValidationError::new(
                        format!("sensor.endpoints[{}]", i),
                        format!("endpoint '{}' must start with '/'", endpoint),
                    ));
                }
            }
        }

        if self.password.is_some() && self.username.is_none() {
            errors.push(ValidationError::new(
                "sensor.username",
                "username is required when a password is set",
            ));
        }

        errors
    }

    /// Full URLs of the configured endpoints.
    pub fn endpoint_urls(&self) -> Vec<String> {
        let base = self.base_url.trim_end_matches('/');
        self.endpoints
            .iter()
            .map(|endpoint| format!("{}{}", base, endpoint))
            .collect()
    }
}

/// Local calendar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// IANA timezone of the sensor's site.
    pub timezone: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Berlin".to_string(),
        }
    }
}

impl ClockConfig {
    /// Validate clock configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        match self.local_clock() {
            Ok(_) => Vec::new(),
            Err(e) => vec![ValidationError::new("clock.timezone", e.to_string())],
        }
    }

    /// Build the clock for the configured zone.
    pub fn local_clock(&self) -> Result<LocalClock, CalendarError> {
        LocalClock::new(&self.timezone)
    }
}

/// Limits for the statistics API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Earliest year served by the month endpoint.
    pub min_year: i32,
    /// Latest year served by the month endpoint.
    pub max_year: i32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            min_year: 2020,
            max_year: 2030,
        }
    }
}

impl StatsConfig {
    /// Validate stats configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.min_year > self.max_year {
            errors.push(ValidationError::new(
                "stats.min_year",
                format!(
                    "min_year {} is after max_year {}",
                    self.min_year, self.max_year
                ),
            ));
        }
        errors
    }

    /// Whether `year` is within the served range.
    pub fn allows_year(&self, year: i32) -> bool {
        (self.min_year..=self.max_year).contains(&year)
    }
}

/// Correction tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Counter value above which a history row is an outlier.
    pub outlier_threshold: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: occupancy_store::DEFAULT_OUTLIER_THRESHOLD,
        }
    }
}

impl RepairConfig {
    /// Validate repair configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        if self.outlier_threshold == 0 {
            vec![ValidationError::new(
                "repair.outlier_threshold",
                "threshold must be greater than 0",
            )]
        } else {
            Vec::new()
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `sensor.endpoints[0]`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("occupancy")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_errors(errors: &[ValidationError], field: &str) -> usize {
        errors.iter().filter(|e| e.field == field).count()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.server.status_window_secs, 300);
        assert_eq!(config.sensor.mode, SensorMode::Push);
        assert_eq!(config.sensor.poll_interval, 60);
        assert_eq!(config.sensor.timeout_secs, 10);
        assert_eq!(config.sensor.endpoints.len(), 5);
        assert_eq!(config.clock.timezone, "Europe/Berlin");
        assert_eq!(config.repair.outlier_threshold, 800);
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.path, occupancy_store::default_db_path());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [server]
            bind = "0.0.0.0:8000"
            status_window_secs = 120

            [storage]
            path = "/data/counts.db"

            [sensor]
            mode = "poll"
            base_url = "http://10.0.0.5"
            username = "admin"
            password = "secret"
            endpoints = ["/api/v5/live"]
            poll_interval = 30
            timeout_secs = 5

            [clock]
            timezone = "Europe/Vienna"

            [stats]
            min_year = 2024
            max_year = 2028
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.status_window_secs, 120);
        assert_eq!(config.storage.path, PathBuf::from("/data/counts.db"));
        assert_eq!(config.sensor.mode, SensorMode::Poll);
        assert_eq!(config.sensor.username.as_deref(), Some("admin"));
        assert_eq!(config.sensor.endpoint_urls(), vec!["http://10.0.0.5/api/v5/live"]);
        assert_eq!(config.clock.timezone, "Europe/Vienna");
        assert!(config.stats.allows_year(2024));
        assert!(!config.stats.allows_year(2029));
        // Section omitted entirely falls back to defaults
        assert_eq!(config.repair.outlier_threshold, 800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("occupancy").join("server.toml");

        let mut config = Config::default();
        config.server.bind = "0.0.0.0:9090".to_string();
        config.storage.path = PathBuf::from("/tmp/test.db");
        config.sensor.mode = SensorMode::Poll;

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.server.bind, "0.0.0.0:9090");
        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/test.db"));
        assert_eq!(loaded.sensor.mode, SensorMode::Poll);
        assert_eq!(loaded.sensor.endpoints, config.sensor.endpoints);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unknown_mode_is_a_parse_error() {
        let result: Result<Config, _> = toml::from_str("[sensor]\nmode = \"carrier-pigeon\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("occupancy/server.toml"));
    }

    #[test]
    fn test_server_bind_validation() {
        let mut server = ServerConfig::default();
        assert!(server.validate().is_empty());

        server.bind = "[::1]:8000".to_string();
        assert!(server.validate().is_empty());

        server.bind = "".to_string();
        assert!(server.validate()[0].message.contains("cannot be empty"));

        server.bind = "127.0.0.1".to_string();
        assert!(server.validate()[0].message.contains("host:port"));

        server.bind = "127.0.0.1:0".to_string();
        assert!(server.validate()[0].message.contains("cannot be 0"));

        server.bind = "127.0.0.1:http".to_string();
        assert!(server.validate()[0].message.contains("must be a number"));
    }

    #[test]
    fn test_status_window_validation() {
        let server = ServerConfig {
            status_window_secs: 0,
            ..ServerConfig::default()
        };
        let errors = server.validate();
        assert_eq!(field_errors(&errors, "server.status_window_secs"), 1);
        assert_eq!(ServerConfig::default().status_window(), time::Duration::minutes(5));
    }

    #[test]
    fn test_sensor_poll_interval_bounds() {
        let mut sensor = SensorConfig {
            poll_interval: 5,
            ..SensorConfig::default()
        };
        assert!(sensor.validate()[0].message.contains("too short"));

        sensor.poll_interval = 7200;
        assert!(sensor.validate()[0].message.contains("too long"));

        sensor.poll_interval = 10;
        assert!(sensor.validate().is_empty());
    }

    #[test]
    fn test_sensor_timeout_bounds() {
        for timeout_secs in [0, 61] {
            let sensor = SensorConfig {
                timeout_secs,
                ..SensorConfig::default()
            };
            assert_eq!(field_errors(&sensor.validate(), "sensor.timeout_secs"), 1);
        }
    }

    #[test]
    fn test_poll_mode_requires_url_and_endpoints() {
        let sensor = SensorConfig {
            mode: SensorMode::Poll,
            base_url: "10.13.1.165".to_string(),
            endpoints: Vec::new(),
            ..SensorConfig::default()
        };
        let errors = sensor.validate();
        assert_eq!(field_errors(&errors, "sensor.base_url"), 1);
        assert_eq!(field_errors(&errors, "sensor.endpoints"), 1);

        // Push mode does not care about the poll target
        let sensor = SensorConfig {
            mode: SensorMode::Push,
            ..sensor
        };
        assert!(sensor.validate().is_empty());
    }

    #[test]
    fn test_endpoint_must_be_absolute_path() {
        let sensor = SensorConfig {
            mode: SensorMode::Poll,
            endpoints: vec!["/ok".to_string(), "counts".to_string()],
            ..SensorConfig::default()
        };
        let errors = sensor.validate();
        assert_eq!(field_errors(&errors, "sensor.endpoints[1]"), 1);
    }

    #[test]
    fn test_password_requires_username() {
        let sensor = SensorConfig {
            password: Some("pass".to_string()),
            ..SensorConfig::default()
        };
        assert_eq!(field_errors(&sensor.validate(), "sensor.username"), 1);
    }

    #[test]
    fn test_endpoint_urls_trim_trailing_slash() {
        let sensor = SensorConfig {
            base_url: "http://sensor.local/".to_string(),
            endpoints: vec!["/counts".to_string()],
            ..SensorConfig::default()
        };
        assert_eq!(sensor.endpoint_urls(), vec!["http://sensor.local/counts"]);
    }

    #[test]
    fn test_timezone_validation() {
        let clock = ClockConfig {
            timezone: "Europe/Atlantis".to_string(),
        };
        let errors = clock.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "clock.timezone");
        assert!(ClockConfig::default().local_clock().is_ok());
    }

    #[test]
    fn test_stats_and_repair_validation() {
        let stats = StatsConfig {
            min_year: 2031,
            max_year: 2030,
        };
        assert_eq!(stats.validate().len(), 1);

        let repair = RepairConfig {
            outlier_threshold: 0,
        };
        assert_eq!(repair.validate().len(), 1);
    }

    #[test]
    fn test_config_validation_collects_all_errors() {
        let mut config = Config::default();
        config.server.bind = "127.0.0.1:0".to_string();
        config.clock.timezone = "Nowhere".to_string();

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 2);

        let display = ConfigError::Validation(errors).to_string();
        assert!(display.contains("server.bind"));
        assert!(display.contains("clock.timezone"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::new("server.bind", "invalid port");
        assert_eq!(format!("{}", error), "server.bind: invalid port");
    }
}
