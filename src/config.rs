//! Agent configuration
//!
//! Settings are read from environment variables; every variable is optional
//! and falls back to its default.
//!
//! ## Environment Variables
//! - `CENTRAL_API_URL`: analytics endpoint features are POSTed to
//! - `ANALYSIS_DAYS_BACK`: days of history per analysis, 1 to 3660 (default 7)
//! - `SCRAPING_INTERVAL_MINUTES`: minutes between scheduled runs (default 60)
//! - `STANDARD_WORK_HOURS`: daily work-hours budget (default 8.0)
//! - `CALENDAR_PROVIDER`: `google` or `outlook` (default `google`)
//! - `REQUEST_TIMEOUT_SECS`: delivery request timeout (default 10)
//! - `CALENDAR_EVENTS_DIR`: root of downloaded provider payloads (default `./events`)
//! - `LOG_LEVEL`: log filter used when `RUST_LOG` is unset (default `info`)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::aggregator::AnalysisParams;
use crate::error::ConfigError;
use crate::features::DEFAULT_WORK_HOURS;
use crate::pipeline::{DEFAULT_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS};
use crate::scheduler::SchedulerConfig;
use crate::types::CalendarProvider;

pub const DEFAULT_CENTRAL_API_URL: &str = "http://localhost:8000/api/features";

/// Calendar agent settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentConfig {
    pub central_api_url: String,
    pub analysis_days_back: u32,
    pub scraping_interval_minutes: u64,
    pub standard_work_hours: f64,
    pub calendar_provider: String,
    pub request_timeout_secs: u64,
    pub events_dir: PathBuf,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            central_api_url: DEFAULT_CENTRAL_API_URL.to_string(),
            analysis_days_back: DEFAULT_LOOKBACK_DAYS,
            scraping_interval_minutes: 60,
            standard_work_hours: DEFAULT_WORK_HOURS,
            calendar_provider: CalendarProvider::Google.as_str().to_string(),
            request_timeout_secs: 10,
            events_dir: PathBuf::from("./events"),
            log_level: "info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load settings from the process environment
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` when a variable is set but cannot be
    /// parsed, or when the resulting settings fail [`AgentConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            central_api_url: get("CENTRAL_API_URL").unwrap_or(defaults.central_api_url),
            analysis_days_back: parse_var(&get, "ANALYSIS_DAYS_BACK", defaults.analysis_days_back)?,
            scraping_interval_minutes: parse_var(
                &get,
                "SCRAPING_INTERVAL_MINUTES",
                defaults.scraping_interval_minutes,
            )?,
            standard_work_hours: parse_var(
                &get,
                "STANDARD_WORK_HOURS",
                defaults.standard_work_hours,
            )?,
            calendar_provider: get("CALENDAR_PROVIDER").unwrap_or(defaults.calendar_provider),
            request_timeout_secs: parse_var(
                &get,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            events_dir: get("CALENDAR_EVENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.events_dir),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check settings that parse fine but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.central_api_url.trim().is_empty() {
            return Err(invalid("CENTRAL_API_URL", &self.central_api_url, "must not be empty"));
        }
        if !(self.standard_work_hours.is_finite() && self.standard_work_hours > 0.0) {
            return Err(invalid(
                "STANDARD_WORK_HOURS",
                &self.standard_work_hours.to_string(),
                "must be a positive number of hours",
            ));
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.analysis_days_back) {
            return Err(invalid(
                "ANALYSIS_DAYS_BACK",
                &self.analysis_days_back.to_string(),
                &format!("must be between 1 and {MAX_LOOKBACK_DAYS}"),
            ));
        }
        if self.calendar_provider.parse::<CalendarProvider>().is_err() {
            return Err(invalid(
                "CALENDAR_PROVIDER",
                &self.calendar_provider,
                "expected \"google\" or \"outlook\"",
            ));
        }
        if self.scraping_interval_minutes == 0 {
            return Err(invalid("SCRAPING_INTERVAL_MINUTES", "0", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("REQUEST_TIMEOUT_SECS", "0", "must be at least 1"));
        }
        Ok(())
    }

    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams {
            work_hours: self.standard_work_hours,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn scraping_interval(&self) -> Duration {
        Duration::from_secs(self.scraping_interval_minutes * 60)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.scraping_interval(),
            provider: self.calendar_provider.clone(),
            lookback_days: self.analysis_days_back,
            ..SchedulerConfig::default()
        }
    }
}

fn parse_var<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
