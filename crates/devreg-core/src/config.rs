//! Service configuration loaded from the environment.
//!
//! Every setting has a default in [`defaults`] and an override in
//! [`env_vars`]. The binary layers command-line flags on top.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable names.
pub mod env_vars {
    pub const DB_PATH: &str = "DEVREG_DB_PATH";
    pub const SERVICE_PORT: &str = "SERVICE_PORT";
    pub const LOG_JSON: &str = "DEVREG_LOG_JSON";
    pub const DB_CONNECT_ATTEMPTS: &str = "DEVREG_DB_CONNECT_ATTEMPTS";
    pub const TELEMETRY_DEVICE_PATTERN: &str = "DEVREG_TELEMETRY_DEVICE_PATTERN";
    pub const TELEMETRY_MIN_TEMP: &str = "DEVREG_TELEMETRY_MIN_TEMP";
    pub const TELEMETRY_MAX_TEMP: &str = "DEVREG_TELEMETRY_MAX_TEMP";
}

/// Default values.
pub mod defaults {
    use std::time::Duration;

    pub const DB_PATH: &str = "data/devices.redb";
    pub const SERVICE_PORT: u16 = 8880;
    pub const DB_CONNECT_ATTEMPTS: u32 = 10;
    pub const DB_CONNECT_BACKOFF: Duration = Duration::from_secs(3);
    /// Short device ids containing this are water-temperature sensors.
    pub const TELEMETRY_DEVICE_PATTERN: &str = "sk-elt-temp-";
    pub const TELEMETRY_MIN_TEMP: f64 = -0.5;
    pub const TELEMETRY_MAX_TEMP: f64 = 15.0;
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub log_json: bool,
    pub connect_attempts: u32,
    pub connect_backoff: Duration,
    pub telemetry: TelemetryConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(defaults::DB_PATH),
            port: defaults::SERVICE_PORT,
            log_json: false,
            connect_attempts: defaults::DB_CONNECT_ATTEMPTS,
            connect_backoff: defaults::DB_CONNECT_BACKOFF,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var(env_vars::DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(defaults::DB_PATH)),
            port: env_or(env_vars::SERVICE_PORT, defaults::SERVICE_PORT),
            log_json: env_or(env_vars::LOG_JSON, false),
            connect_attempts: env_or(env_vars::DB_CONNECT_ATTEMPTS, defaults::DB_CONNECT_ATTEMPTS)
                .max(1),
            connect_backoff: defaults::DB_CONNECT_BACKOFF,
            telemetry: TelemetryConfig::from_env(),
        }
    }
}

/// Gating rules for the water-temperature telemetry side channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub device_pattern: String,
    pub min_temperature: f64,
    pub max_temperature: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            device_pattern: defaults::TELEMETRY_DEVICE_PATTERN.to_string(),
            min_temperature: defaults::TELEMETRY_MIN_TEMP,
            max_temperature: defaults::TELEMETRY_MAX_TEMP,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            device_pattern: std::env::var(env_vars::TELEMETRY_DEVICE_PATTERN)
                .unwrap_or_else(|_| defaults::TELEMETRY_DEVICE_PATTERN.to_string()),
            min_temperature: env_or(env_vars::TELEMETRY_MIN_TEMP, defaults::TELEMETRY_MIN_TEMP),
            max_temperature: env_or(env_vars::TELEMETRY_MAX_TEMP, defaults::TELEMETRY_MAX_TEMP),
        }
    }

    /// Whether the short device id names a water-temperature sensor.
    pub fn matches_device(&self, short_device_id: &str) -> bool {
        !self.device_pattern.is_empty() && short_device_id.contains(&self.device_pattern)
    }

    /// Whether a temperature falls inside the inclusive allowed range.
    pub fn in_range(&self, temperature: f64) -> bool {
        temperature >= self.min_temperature && temperature <= self.max_temperature
    }
}
