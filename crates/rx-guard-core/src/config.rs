//! Engine configuration from the environment (and an optional `.env`).

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const ORACLE_TIMEOUT_ENV: &str = "RX_GUARD_ORACLE_TIMEOUT_SECS";
pub const MAX_CONCURRENCY_ENV: &str = "RX_GUARD_MAX_CONCURRENCY";
pub const MAX_SUGGESTIONS_ENV: &str = "RX_GUARD_MAX_SUGGESTIONS";
pub const LOG_LEVEL_ENV: &str = "RX_GUARD_LOG_LEVEL";

const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;
const MAX_ORACLE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_MAX_SUGGESTIONS: usize = 3;

/// Configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be an integer, got '{value}'")]
    NotANumber { var: &'static str, value: String },

    #[error("{var} must be between {min} and {max}, got {value}")]
    OutOfRange {
        var: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Tracing controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Settings of the screening engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Per-medicine oracle timeout
    pub oracle_timeout: Duration,
    /// Oracle calls allowed in flight at once
    pub max_concurrency: usize,
    /// Suggestions shown for an unknown medicine
    pub max_suggestions: usize,
    pub telemetry: TelemetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let timeout_secs = read_number(
            ORACLE_TIMEOUT_ENV,
            DEFAULT_ORACLE_TIMEOUT_SECS,
            1,
            MAX_ORACLE_TIMEOUT_SECS,
        )?;
        let max_concurrency =
            read_number(MAX_CONCURRENCY_ENV, DEFAULT_MAX_CONCURRENCY as u64, 1, 1024)? as usize;
        let max_suggestions =
            read_number(MAX_SUGGESTIONS_ENV, DEFAULT_MAX_SUGGESTIONS as u64, 0, 50)? as usize;
        let log_level = env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            oracle_timeout: Duration::from_secs(timeout_secs),
            max_concurrency,
            max_suggestions,
            telemetry: TelemetryConfig { log_level },
        })
    }

    /// Builder-style oracle timeout.
    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    /// Builder-style concurrency bound (at least 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }
}

fn read_number(var: &'static str, default: u64, min: u64, max: u64) -> Result<u64, ConfigError> {
    let value = match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::NotANumber {
                    var,
                    value: raw.clone(),
                })?
        }
        _ => default,
    };

    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            var,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var(ORACLE_TIMEOUT_ENV);
        env::remove_var(MAX_CONCURRENCY_ENV);
        env::remove_var(MAX_SUGGESTIONS_ENV);
        env::remove_var(LOG_LEVEL_ENV);
    }

    #[test]
    fn test_defaults_when_env_missing() {
        let _lock = env_guard().lock().unwrap();
        reset_env();

        let config = EngineConfig::load().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.oracle_timeout, Duration::from_secs(30));
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_reads_overrides() {
        let _lock = env_guard().lock().unwrap();
        reset_env();
        env::set_var(ORACLE_TIMEOUT_ENV, "5");
        env::set_var(MAX_CONCURRENCY_ENV, "8");
        env::set_var(LOG_LEVEL_ENV, "debug");

        let config = EngineConfig::load().unwrap();
        assert_eq!(config.oracle_timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.telemetry.log_level, "debug");
        reset_env();
    }

    #[test]
    fn test_rejects_invalid_values() {
        let _lock = env_guard().lock().unwrap();
        reset_env();

        env::set_var(ORACLE_TIMEOUT_ENV, "soon");
        assert!(matches!(
            EngineConfig::load(),
            Err(ConfigError::NotANumber { .. })
        ));

        env::set_var(ORACLE_TIMEOUT_ENV, "0");
        assert!(matches!(
            EngineConfig::load(),
            Err(ConfigError::OutOfRange { value: 0, .. })
        ));

        env::set_var(ORACLE_TIMEOUT_ENV, "10");
        env::set_var(MAX_CONCURRENCY_ENV, "0");
        assert!(matches!(
            EngineConfig::load(),
            Err(ConfigError::OutOfRange { var: MAX_CONCURRENCY_ENV, .. })
        ));
        reset_env();
    }
}
