//! One configured monitoring run, from start to stop.
//!
//! A `Session` is a plain single-threaded value: every event (tick, input,
//! external stop, sequence timeout) is a method call that runs to completion.
//! The service module drives it from timers and channels.

use crate::config::{MonitorConfig, Settings};
use crate::constants::{DEFAULT_SEQUENCE_TIMEOUT_MS, DEFAULT_TICK_INTERVAL_MS};
use crate::lock::{LockController, LockState, OverlayPresenter, Transition};
use crate::matcher::InputCode;
use crate::probe::ForegroundQuery;
use log::info;
use serde::Serialize;
use std::time::Duration;

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub tick_interval: Duration,
    pub sequence_timeout_ms: i64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            sequence_timeout_ms: DEFAULT_SEQUENCE_TIMEOUT_MS,
        }
    }
}

impl From<&Settings> for SessionOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            tick_interval: Duration::from_millis(settings.tick_interval_ms),
            sequence_timeout_ms: settings.sequence_timeout_ms,
        }
    }
}

/// Read-only snapshot for UI layers re-validating on resume or focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: LockState,
    pub target_app_id: String,
    pub usage_limit_millis: i64,
    pub accumulated_millis: i64,
    pub remaining_millis: i64,
}

pub struct Session<P: OverlayPresenter> {
    controller: LockController<P>,
    probe: Box<dyn ForegroundQuery + Send>,
}

impl<P: OverlayPresenter> Session<P> {
    pub fn start(
        config: MonitorConfig,
        probe: Box<dyn ForegroundQuery + Send>,
        presenter: P,
        options: SessionOptions,
        now: i64,
    ) -> Self {
        info!(
            "Starting session: {} limited to {} ms",
            config.target_app_id(),
            config.usage_limit_millis()
        );
        Self {
            controller: LockController::new(config, presenter, options.sequence_timeout_ms, now),
            probe,
        }
    }

    pub fn tick(&mut self, now: i64) -> Transition {
        self.controller.on_tick(now, self.probe.as_ref())
    }

    pub fn handle_input(&mut self, code: InputCode, now: i64) -> Transition {
        self.controller.on_input(code, now)
    }

    pub fn external_stop(&mut self, now: i64) -> Transition {
        self.controller.on_external_stop(now)
    }

    pub fn expire_sequence(&mut self, now: i64) {
        self.controller.on_sequence_timeout(now);
    }

    /// When the sequence timeout timer should fire next, if armed.
    pub fn next_deadline(&self) -> Option<i64> {
        self.controller.sequence_deadline()
    }

    /// Re-supplying a config resets all session state.
    pub fn reconfigure(&mut self, config: MonitorConfig, now: i64) -> Transition {
        info!(
            "Reconfiguring session: {} limited to {} ms",
            config.target_app_id(),
            config.usage_limit_millis()
        );
        self.controller.reconfigure(config, now)
    }

    pub fn state(&self) -> LockState {
        self.controller.state()
    }

    pub fn status(&self) -> SessionStatus {
        let accumulator = self.controller.accumulator();
        SessionStatus {
            state: self.controller.state(),
            target_app_id: accumulator.config().target_app_id().to_string(),
            usage_limit_millis: accumulator.config().usage_limit_millis(),
            accumulated_millis: accumulator.accumulated_millis(),
            remaining_millis: accumulator.remaining_millis(),
        }
    }

    /// Tear the session down, closing the overlay if it is up.
    pub fn stop(mut self, now: i64) {
        self.controller.shutdown(now);
        info!("Session stopped");
    }
}
