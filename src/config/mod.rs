use crate::funnel::domain::{default_report_offset, DEFAULT_WARRANTY_DAYS};
use crate::funnel::report::ReportSettings;
use crate::funnel::OpenTermBilling;
use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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
    pub reporting: ReportingConfig,
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
            reporting: ReportingConfig::from_env()?,
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

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Business rules and data location for performance reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportingConfig {
    pub default_warranty_days: u32,
    pub open_term: OpenTermBilling,
    pub utc_offset: FixedOffset,
    pub data_dir: Option<PathBuf>,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            default_warranty_days: DEFAULT_WARRANTY_DAYS,
            open_term: OpenTermBilling::default(),
            utc_offset: default_report_offset(),
            data_dir: None,
        }
    }
}

impl ReportingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = non_empty_var("APP_WARRANTY_DAYS") {
            config.default_warranty_days = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidWarrantyDays(raw.clone()))?;
        }

        if let Some(raw) = non_empty_var("APP_OPEN_CONTRACT_BILLING") {
            config.open_term = OpenTermBilling::from_label(&raw)
                .ok_or(ConfigError::InvalidOpenTermBilling(raw))?;
        }

        if let Some(raw) = non_empty_var("APP_REPORT_UTC_OFFSET") {
            config.utc_offset = parse_utc_offset(&raw)
                .ok_or(ConfigError::InvalidReportOffset(raw))?;
        }

        config.data_dir = non_empty_var("APP_DATA_DIR").map(PathBuf::from);
        Ok(config)
    }

    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            default_warranty_days: self.default_warranty_days,
            open_term: self.open_term,
            utc_offset: self.utc_offset,
        }
    }
}

/// Accepts `Z`/`UTC` or a signed `+HH:MM` offset.
fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Some(Utc.fix());
    }
    trimmed.parse::<FixedOffset>().ok()
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidWarrantyDays(String),
    InvalidOpenTermBilling(String),
    InvalidReportOffset(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidWarrantyDays(value) => write!(
                f,
                "APP_WARRANTY_DAYS must be a non-negative whole number of days, got '{value}'"
            ),
            ConfigError::InvalidOpenTermBilling(value) => write!(
                f,
                "APP_OPEN_CONTRACT_BILLING must be 'month_end' or 'as_of', got '{value}'"
            ),
            ConfigError::InvalidReportOffset(value) => write!(
                f,
                "APP_REPORT_UTC_OFFSET must be a UTC offset such as '+09:00', got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidWarrantyDays(_)
            | ConfigError::InvalidOpenTermBilling(_)
            | ConfigError::InvalidReportOffset(_) => None,
        }
    }
}
