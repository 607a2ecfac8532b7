// src/constants.rs

/// Milliseconds in one minute
pub const MILLIS_PER_MINUTE: i64 = 60 * 1000;

/// Limit used when the configured one is missing, unparsable or not positive
pub const DEFAULT_USAGE_LIMIT_MILLIS: i64 = MILLIS_PER_MINUTE;

/// Largest accepted usage limit in minutes (24 hours)
pub const MAX_USAGE_LIMIT_MINUTES: i64 = 24 * 60;

/// Cadence of the accumulator tick
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Idle time after which a partially entered unlock sequence is discarded
pub const DEFAULT_SEQUENCE_TIMEOUT_MS: i64 = 3000;

/// How far back the foreground probe looks for transition events (2 hours)
pub const DEFAULT_PROBE_LOOKBACK_MS: i64 = 2 * 60 * 60 * 1000;

/// Cadence of the desktop foreground recorder
pub const DEFAULT_RECORDER_POLL_MS: u64 = 1000;

/// How often the recorder re-logs an app that stays in front (10 minutes).
/// Must stay well under the probe lookback and the event retention.
pub const DEFAULT_RECORDER_HEARTBEAT_MS: i64 = 10 * 60 * 1000;

/// Foreground events older than this are pruned from the log
pub const DEFAULT_EVENT_RETENTION_HOURS: i64 = 24;

/// Identifier the limiter itself reports as when its overlay is in front
pub const DEFAULT_SELF_APP_ID: &str = "usagelock";

/// Accepted range for tick/poll intervals
pub const MIN_INTERVAL_MS: u64 = 10;
pub const MAX_INTERVAL_MS: u64 = 60 * 1000;

/// Maximum target application identifier length
pub const MAX_APP_ID_LEN: usize = 255;

/// Raw key codes for the hardware volume buttons
pub const KEYCODE_VOLUME_UP: u32 = 24;
pub const KEYCODE_VOLUME_DOWN: u32 = 25;
