use crate::constants::{
    DEFAULT_USAGE_LIMIT_MILLIS, MAX_APP_ID_LEN, MAX_INTERVAL_MS, MAX_USAGE_LIMIT_MINUTES,
    MILLIS_PER_MINUTE, MIN_INTERVAL_MS,
};
use crate::error::AppError;
use log::warn;

/// Validate the target application identifier.
/// Returns the trimmed identifier if valid.
pub fn validate_target_app_id(target: &str) -> Result<&str, AppError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(AppError::invalid("target_app_id", "cannot be empty"));
    }
    if target.len() > MAX_APP_ID_LEN {
        return Err(AppError::invalid(
            "target_app_id",
            format!("cannot exceed {MAX_APP_ID_LEN} characters"),
        ));
    }
    Ok(target)
}

/// Normalize a usage limit in milliseconds.
///
/// Non-positive limits would lock the screen on the very first tick, so they
/// fall back to the default minimum. Limits above 24 hours are capped.
pub fn normalize_usage_limit_millis(limit_millis: i64) -> i64 {
    if limit_millis <= 0 {
        warn!(
            "Usage limit {limit_millis} ms is not positive, using {DEFAULT_USAGE_LIMIT_MILLIS} ms"
        );
        return DEFAULT_USAGE_LIMIT_MILLIS;
    }
    let max_millis = MAX_USAGE_LIMIT_MINUTES * MILLIS_PER_MINUTE;
    if limit_millis > max_millis {
        warn!("Usage limit {limit_millis} ms exceeds 24 hours, capping");
        return max_millis;
    }
    limit_millis
}

/// Parse a usage limit typed in minutes.
///
/// Never fails: a missing or unparsable value yields the default minimum.
pub fn parse_usage_limit_minutes(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        warn!("No usage limit configured, using {DEFAULT_USAGE_LIMIT_MILLIS} ms");
        return DEFAULT_USAGE_LIMIT_MILLIS;
    };

    match raw.parse::<i64>() {
        Ok(minutes) => normalize_usage_limit_millis(minutes.saturating_mul(MILLIS_PER_MINUTE)),
        Err(e) => {
            warn!("Unparsable usage limit '{raw}' ({e}), using {DEFAULT_USAGE_LIMIT_MILLIS} ms");
            DEFAULT_USAGE_LIMIT_MILLIS
        }
    }
}

/// Validate a timer interval (tick cadence, recorder poll).
pub fn validate_interval_ms(field: &'static str, interval_ms: u64) -> Result<(), AppError> {
    if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval_ms) {
        return Err(AppError::invalid(
            field,
            format!("must be {MIN_INTERVAL_MS}-{MAX_INTERVAL_MS} ms"),
        ));
    }
    Ok(())
}

/// Validate a duration that must be strictly positive.
pub fn validate_positive_millis(field: &'static str, value: i64) -> Result<(), AppError> {
    if value <= 0 {
        return Err(AppError::invalid(field, "must be positive"));
    }
    Ok(())
}
