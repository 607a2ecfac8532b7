use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of millisecond timestamps for ticks and inputs.
pub trait Clock: Send {
    fn now_millis(&self) -> i64;
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Anchored to the wall clock once, then advanced by `Instant`, so readings
/// never go backwards even if the system clock is adjusted.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    base_millis: i64,
    started: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            base_millis: current_timestamp_millis(),
            started: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.base_millis.saturating_add(elapsed)
    }
}
