use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Tunables for scoring, pipeline analytics, and optimistic write retries.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    pub bottleneck_threshold_days: f64,
    /// Technical share of the overall score; HR takes the remainder.
    pub technical_weight: f32,
    /// Attempts a booking gets when its versioned write loses a race.
    pub schedule_attempts: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            bottleneck_threshold_days: 3.0,
            technical_weight: 0.6,
            schedule_attempts: 3,
        }
    }
}

impl WorkflowConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bottleneck_threshold_days = match env::var("WORKFLOW_BOTTLENECK_THRESHOLD_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|days| days.is_finite() && *days >= 0.0)
                .ok_or(ConfigError::InvalidBottleneckThreshold { value: raw })?,
            Err(_) => defaults.bottleneck_threshold_days,
        };

        let technical_weight = match env::var("WORKFLOW_TECHNICAL_WEIGHT") {
            Ok(raw) => raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|weight| (0.0..=1.0).contains(weight))
                .ok_or(ConfigError::InvalidTechnicalWeight { value: raw })?,
            Err(_) => defaults.technical_weight,
        };

        let schedule_attempts = match env::var("WORKFLOW_SCHEDULE_ATTEMPTS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or(ConfigError::InvalidScheduleAttempts { value: raw })?,
            Err(_) => defaults.schedule_attempts,
        };

        Ok(Self {
            bottleneck_threshold_days,
            technical_weight,
            schedule_attempts,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBottleneckThreshold { value: String },
    InvalidTechnicalWeight { value: String },
    InvalidScheduleAttempts { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBottleneckThreshold { value } => write!(
                f,
                "WORKFLOW_BOTTLENECK_THRESHOLD_DAYS must be a non-negative number of days, got '{value}'"
            ),
            ConfigError::InvalidTechnicalWeight { value } => write!(
                f,
                "WORKFLOW_TECHNICAL_WEIGHT must lie between 0 and 1, got '{value}'"
            ),
            ConfigError::InvalidScheduleAttempts { value } => write!(
                f,
                "WORKFLOW_SCHEDULE_ATTEMPTS must be a positive integer, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
