use crate::constants::{
    DEFAULT_EVENT_RETENTION_HOURS, DEFAULT_PROBE_LOOKBACK_MS, DEFAULT_RECORDER_HEARTBEAT_MS,
    DEFAULT_RECORDER_POLL_MS, DEFAULT_SELF_APP_ID, DEFAULT_SEQUENCE_TIMEOUT_MS,
    DEFAULT_TICK_INTERVAL_MS,
};
use crate::error::AppError;
use crate::validation::{
    normalize_usage_limit_millis, parse_usage_limit_minutes, validate_interval_ms,
    validate_positive_millis, validate_target_app_id,
};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "usagelock.db";

/// Target and budget for one monitoring session.
///
/// Only constructible through validation, so a session never starts with a
/// blank target or a non-positive limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    target_app_id: String,
    usage_limit_millis: i64,
}

impl MonitorConfig {
    pub fn new(target_app_id: &str, usage_limit_millis: i64) -> Result<Self, AppError> {
        let target_app_id = validate_target_app_id(target_app_id)?;
        Ok(Self {
            target_app_id: target_app_id.to_string(),
            usage_limit_millis: normalize_usage_limit_millis(usage_limit_millis),
        })
    }

    /// Build from the raw values a configuration form hands over: the limit
    /// is typed in minutes and may be missing or garbage.
    pub fn from_minutes(target_app_id: &str, raw_limit_minutes: Option<&str>) -> Result<Self, AppError> {
        let target_app_id = validate_target_app_id(target_app_id)?;
        Ok(Self {
            target_app_id: target_app_id.to_string(),
            usage_limit_millis: parse_usage_limit_minutes(raw_limit_minutes),
        })
    }

    pub fn target_app_id(&self) -> &str {
        &self.target_app_id
    }

    pub fn usage_limit_millis(&self) -> i64 {
        self.usage_limit_millis
    }
}

/// On-disk configuration, `config.json` in the project config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub target_app_id: Option<String>,
    /// Minutes, as a number or a string. Anything unparsable falls back to
    /// the default limit.
    pub usage_limit_minutes: Option<Value>,
    pub tick_interval_ms: u64,
    pub sequence_timeout_ms: i64,
    pub probe_lookback_ms: i64,
    pub recorder_poll_ms: u64,
    pub self_app_id: String,
    pub database_path: Option<PathBuf>,
    pub event_retention_hours: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_app_id: None,
            usage_limit_minutes: None,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            sequence_timeout_ms: DEFAULT_SEQUENCE_TIMEOUT_MS,
            probe_lookback_ms: DEFAULT_PROBE_LOOKBACK_MS,
            recorder_poll_ms: DEFAULT_RECORDER_POLL_MS,
            self_app_id: DEFAULT_SELF_APP_ID.to_string(),
            database_path: None,
            event_retention_hours: DEFAULT_EVENT_RETENTION_HOURS,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&raw).map_err(|source| AppError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_interval_ms("tick_interval_ms", self.tick_interval_ms)?;
        validate_interval_ms("recorder_poll_ms", self.recorder_poll_ms)?;
        validate_positive_millis("sequence_timeout_ms", self.sequence_timeout_ms)?;
        validate_positive_millis("probe_lookback_ms", self.probe_lookback_ms)?;
        validate_positive_millis("event_retention_hours", self.event_retention_hours)?;
        if self.self_app_id.trim().is_empty() {
            return Err(AppError::invalid("self_app_id", "cannot be empty"));
        }
        Ok(())
    }

    /// The usage limit as the raw text a user would have typed.
    pub fn raw_usage_limit(&self) -> Option<String> {
        self.usage_limit_minutes.as_ref().and_then(usage_limit_text)
    }

    /// Validate the target and limit into a session config.
    pub fn monitor_config(&self) -> Result<MonitorConfig, AppError> {
        let target = self.target_app_id.as_deref().unwrap_or_default();
        MonitorConfig::from_minutes(target, self.raw_usage_limit().as_deref())
    }

    /// Event retention window in milliseconds.
    pub fn event_retention_ms(&self) -> i64 {
        self.event_retention_hours.saturating_mul(60 * 60 * 1000)
    }

    /// Recorder heartbeat: at most half the probe lookback, so an app that
    /// stays in front always has an event inside the probe window.
    pub fn recorder_heartbeat_ms(&self) -> i64 {
        (self.probe_lookback_ms / 2).clamp(1, DEFAULT_RECORDER_HEARTBEAT_MS)
    }

    /// Database path, falling back to the project data directory.
    pub fn resolve_database_path(&self) -> Result<PathBuf, AppError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }
}

/// Text form of a usage limit given as a JSON number or string.
pub fn usage_limit_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        other @ (Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_)) => {
            warn!("Ignoring usage limit of unexpected type: {other}");
            None
        }
    }
}

fn project_dirs() -> Result<ProjectDirs, AppError> {
    ProjectDirs::from("com", "usagelock", "UsageLock").ok_or(AppError::NoProjectDirs)
}

pub fn default_config_path() -> Result<PathBuf, AppError> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
}

/// Get the database path, creating the data directory if needed.
pub fn default_database_path() -> Result<PathBuf, AppError> {
    let proj_dirs = project_dirs()?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join(DATABASE_FILE_NAME))
}
