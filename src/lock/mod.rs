//! Lock controller: the two-state machine deciding whether the block overlay
//! is up, and the only component allowed to reset the accumulator.

use crate::accumulator::UsageAccumulator;
use crate::config::MonitorConfig;
use crate::matcher::{InputCode, SequenceMatcher};
use crate::probe::ForegroundQuery;
use crossbeam_channel::Sender;
use log::{debug, info};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Monitoring,
    Locked,
}

/// Why the overlay was taken down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockReason {
    SequenceMatched,
    ExternalStop,
    Reconfigured,
    SessionStopped,
}

/// What a controller call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Locked,
    Unlocked(UnlockReason),
}

/// Whoever draws the block UI. Calls are fire-and-forget.
pub trait OverlayPresenter: Send {
    fn show(&mut self);
    fn close(&mut self);
}

/// Command sent to the overlay's owner over a session-scoped channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayCommand {
    Show,
    Close,
}

/// Presenter forwarding to a channel. A gone receiver is not an error.
pub struct ChannelPresenter {
    tx: Sender<OverlayCommand>,
}

impl ChannelPresenter {
    pub fn new(tx: Sender<OverlayCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, command: OverlayCommand) {
        if self.tx.send(command).is_err() {
            debug!("Overlay receiver gone, dropping {command:?}");
        }
    }
}

impl OverlayPresenter for ChannelPresenter {
    fn show(&mut self) {
        self.send(OverlayCommand::Show);
    }

    fn close(&mut self) {
        self.send(OverlayCommand::Close);
    }
}

pub struct LockController<P: OverlayPresenter> {
    state: LockState,
    accumulator: UsageAccumulator,
    /// Present only while locked.
    matcher: Option<SequenceMatcher>,
    sequence_timeout_ms: i64,
    presenter: P,
}

impl<P: OverlayPresenter> LockController<P> {
    pub fn new(config: MonitorConfig, presenter: P, sequence_timeout_ms: i64, now: i64) -> Self {
        Self {
            state: LockState::Monitoring,
            accumulator: UsageAccumulator::new(config, now),
            matcher: None,
            sequence_timeout_ms,
            presenter,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn accumulator(&self) -> &UsageAccumulator {
        &self.accumulator
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Run one accumulator tick and lock on the first crossing.
    pub fn on_tick(&mut self, now: i64, probe: &dyn ForegroundQuery) -> Transition {
        let result = self.accumulator.tick(now, probe);
        if result.crossed_threshold {
            self.on_threshold_crossed()
        } else {
            Transition::None
        }
    }

    /// Enter `Locked`. Repeated notifications while locked are ignored.
    pub fn on_threshold_crossed(&mut self) -> Transition {
        match self.state {
            LockState::Locked => Transition::None,
            LockState::Monitoring => {
                self.accumulator.freeze();
                self.matcher = Some(SequenceMatcher::new(self.sequence_timeout_ms));
                self.state = LockState::Locked;
                info!(
                    "Usage limit reached for {} ({} ms), locking",
                    self.accumulator.config().target_app_id(),
                    self.accumulator.accumulated_millis()
                );
                self.presenter.show();
                Transition::Locked
            }
        }
    }

    /// Feed an input code. Ignored unless locked.
    pub fn on_input(&mut self, code: InputCode, now: i64) -> Transition {
        let Some(matcher) = self.matcher.as_mut() else {
            debug!("Ignoring input {code:?} while monitoring");
            return Transition::None;
        };
        if matcher.on_input(code, now) {
            self.unlock(UnlockReason::SequenceMatched, now)
        } else {
            Transition::None
        }
    }

    /// The overlay asked to be closed from its side.
    pub fn on_external_stop(&mut self, now: i64) -> Transition {
        self.unlock(UnlockReason::ExternalStop, now)
    }

    /// Discard partial sequence progress whose timeout has elapsed.
    pub fn on_sequence_timeout(&mut self, now: i64) {
        if let Some(matcher) = self.matcher.as_mut() {
            if matcher.expire(now) {
                debug!("Unlock sequence timed out, starting over");
            }
        }
    }

    /// When the pending sequence timeout fires, if any.
    pub fn sequence_deadline(&self) -> Option<i64> {
        self.matcher.as_ref().and_then(SequenceMatcher::deadline)
    }

    /// Replace the config and start over, taking the overlay down if it is up.
    pub fn reconfigure(&mut self, config: MonitorConfig, now: i64) -> Transition {
        let transition = self.unlock(UnlockReason::Reconfigured, now);
        self.accumulator.reset_session(config, now);
        transition
    }

    /// Session teardown: never leave a block on screen that nothing can dismiss.
    pub fn shutdown(&mut self, now: i64) -> Transition {
        self.unlock(UnlockReason::SessionStopped, now)
    }

    /// Return to `Monitoring`. A no-op when already monitoring, so two exit
    /// triggers racing each other produce one reset and one close.
    fn unlock(&mut self, reason: UnlockReason, now: i64) -> Transition {
        match self.state {
            LockState::Monitoring => Transition::None,
            LockState::Locked => {
                self.matcher = None;
                self.accumulator.reset(now);
                self.state = LockState::Monitoring;
                info!("Unlocked ({reason:?}), monitoring again");
                self.presenter.close();
                Transition::Unlocked(reason)
            }
        }
    }
}
