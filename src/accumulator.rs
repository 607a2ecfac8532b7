//! Usage accumulator: adds up how long the target app has been in front.

use crate::config::MonitorConfig;
use crate::probe::ForegroundQuery;
use log::debug;

/// Outcome of one accumulator tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickResult {
    /// Level-triggered: stays true on every tick until the next reset.
    pub crossed_threshold: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatorState {
    pub accumulated_millis: i64,
    pub last_sample_timestamp: i64,
    pub frozen: bool,
}

impl AccumulatorState {
    fn fresh(now: i64) -> Self {
        Self {
            accumulated_millis: 0,
            last_sample_timestamp: now,
            frozen: false,
        }
    }
}

#[derive(Debug)]
pub struct UsageAccumulator {
    config: MonitorConfig,
    state: AccumulatorState,
}

impl UsageAccumulator {
    pub fn new(config: MonitorConfig, now: i64) -> Self {
        Self {
            config,
            state: AccumulatorState::fresh(now),
        }
    }

    /// Sample the foreground app and account the time since the last tick.
    ///
    /// The sample timestamp moves forward on every unfrozen tick, matching or
    /// not, so no interval is ever attributed twice.
    pub fn tick(&mut self, now: i64, probe: &dyn ForegroundQuery) -> TickResult {
        if self.state.frozen {
            return TickResult::default();
        }

        let delta = now.saturating_sub(self.state.last_sample_timestamp).max(0);
        self.state.last_sample_timestamp = now;

        let foreground = probe.sample(now);
        if foreground.is(self.config.target_app_id()) {
            self.state.accumulated_millis = self.state.accumulated_millis.saturating_add(delta);
            debug!(
                "{} in foreground, +{delta} ms ({} / {} ms)",
                self.config.target_app_id(),
                self.state.accumulated_millis,
                self.config.usage_limit_millis()
            );
        }

        TickResult {
            crossed_threshold: self.state.accumulated_millis >= self.config.usage_limit_millis(),
        }
    }

    /// Start over with a new config.
    pub fn reset_session(&mut self, config: MonitorConfig, now: i64) {
        self.config = config;
        self.reset(now);
    }

    /// Start over with the current config.
    pub fn reset(&mut self, now: i64) {
        self.state = AccumulatorState::fresh(now);
    }

    pub fn freeze(&mut self) {
        self.state.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.state.frozen = false;
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn accumulated_millis(&self) -> i64 {
        self.state.accumulated_millis
    }

    pub fn remaining_millis(&self) -> i64 {
        (self.config.usage_limit_millis() - self.state.accumulated_millis).max(0)
    }

    pub fn is_frozen(&self) -> bool {
        self.state.frozen
    }
}
