//! Secret-sequence matcher for unlocking the overlay with hardware buttons.

use crate::constants::{DEFAULT_SEQUENCE_TIMEOUT_MS, KEYCODE_VOLUME_DOWN, KEYCODE_VOLUME_UP};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A raw input event delivered while the overlay is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum InputCode {
    VolumeUp,
    VolumeDown,
    Other(u32),
}

impl From<u32> for InputCode {
    fn from(code: u32) -> Self {
        match code {
            KEYCODE_VOLUME_UP => InputCode::VolumeUp,
            KEYCODE_VOLUME_DOWN => InputCode::VolumeDown,
            other => InputCode::Other(other),
        }
    }
}

impl From<InputCode> for u32 {
    fn from(code: InputCode) -> Self {
        match code {
            InputCode::VolumeUp => KEYCODE_VOLUME_UP,
            InputCode::VolumeDown => KEYCODE_VOLUME_DOWN,
            InputCode::Other(other) => other,
        }
    }
}

/// The one and only unlock pattern.
pub const UNLOCK_PATTERN: [InputCode; 3] =
    [InputCode::VolumeUp, InputCode::VolumeUp, InputCode::VolumeDown];

#[derive(Debug)]
pub struct SequenceMatcher {
    buffer: VecDeque<InputCode>,
    last_input_at: Option<i64>,
    timeout_ms: i64,
}

impl Default for SequenceMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_TIMEOUT_MS)
    }
}

impl SequenceMatcher {
    pub fn new(timeout_ms: i64) -> Self {
        Self {
            buffer: VecDeque::with_capacity(UNLOCK_PATTERN.len()),
            last_input_at: None,
            timeout_ms,
        }
    }

    /// Feed one input. Returns true when the trailing inputs spell the unlock
    /// pattern; the buffer is cleared on a match.
    pub fn on_input(&mut self, code: InputCode, now: i64) -> bool {
        // A timer that has not fired yet must not keep stale progress alive.
        self.expire(now);

        self.buffer.push_back(code);
        while self.buffer.len() > UNLOCK_PATTERN.len() {
            self.buffer.pop_front();
        }
        self.last_input_at = Some(now);

        let matched = self.buffer.iter().eq(UNLOCK_PATTERN.iter());
        if matched {
            self.clear();
        }
        matched
    }

    /// When the pending timeout fires, if any input is buffered.
    pub fn deadline(&self) -> Option<i64> {
        if self.buffer.is_empty() {
            return None;
        }
        self.last_input_at
            .map(|last| last.saturating_add(self.timeout_ms))
    }

    /// Drop partial progress once the timeout has elapsed. Returns true if
    /// anything was discarded.
    pub fn expire(&mut self, now: i64) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.clear();
                true
            }
            Some(_) | None => false,
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_input_at = None;
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::InputCode::{VolumeDown as Down, VolumeUp as Up};

    fn feed(matcher: &mut SequenceMatcher, inputs: &[(InputCode, i64)]) -> Vec<bool> {
        inputs.iter().map(|(code, at)| matcher.on_input(*code, *at)).collect()
    }

    #[test]
    fn test_exact_pattern_matches() {
        let mut matcher = SequenceMatcher::default();
        let results = feed(&mut matcher, &[(Up, 0), (Up, 100), (Down, 200)]);
        assert_eq!(results, vec![false, false, true]);
        assert_eq!(matcher.pending(), 0);
    }

    #[test]
    fn test_trailing_suffix_matches() {
        let mut matcher = SequenceMatcher::default();
        let results = feed(&mut matcher, &[(Down, 0), (Up, 100), (Up, 200), (Down, 300)]);
        assert_eq!(results, vec![false, false, false, true]);
    }

    #[test]
    fn test_wrong_order_never_matches() {
        let mut matcher = SequenceMatcher::default();
        let results = feed(&mut matcher, &[(Up, 0), (Down, 100), (Up, 200)]);
        assert!(results.iter().all(|m| !m));
    }

    #[test]
    fn test_timeout_discards_progress() {
        let mut matcher = SequenceMatcher::default();
        matcher.on_input(Up, 0);
        let results = feed(&mut matcher, &[(Up, 3500), (Down, 3600)]);
        assert_eq!(results, vec![false, false]);
    }

    #[test]
    fn test_inputs_inside_window_keep_progress() {
        let mut matcher = SequenceMatcher::default();
        let results = feed(&mut matcher, &[(Up, 0), (Up, 2900), (Down, 5800)]);
        assert_eq!(results, vec![false, false, true]);
    }

    #[test]
    fn test_unrecognized_code_breaks_match() {
        let mut matcher = SequenceMatcher::default();
        let results = feed(
            &mut matcher,
            &[(Up, 0), (Up, 100), (InputCode::Other(4), 200), (Down, 300)],
        );
        assert!(results.iter().all(|m| !m));
    }

    #[test]
    fn test_buffer_stays_trimmed() {
        let mut matcher = SequenceMatcher::default();
        feed(&mut matcher, &[(Down, 0), (Down, 10), (Down, 20), (Down, 30), (Down, 40)]);
        assert_eq!(matcher.pending(), UNLOCK_PATTERN.len());
    }

    #[test]
    fn test_deadline_and_expire() {
        let mut matcher = SequenceMatcher::new(1000);
        assert_eq!(matcher.deadline(), None);

        matcher.on_input(Up, 500);
        assert_eq!(matcher.deadline(), Some(1500));

        assert!(!matcher.expire(1499));
        assert_eq!(matcher.pending(), 1);
        assert!(matcher.expire(1500));
        assert_eq!(matcher.pending(), 0);
        assert_eq!(matcher.deadline(), None);
    }

    #[test]
    fn test_input_code_from_raw() {
        assert_eq!(InputCode::from(24), Up);
        assert_eq!(InputCode::from(25), Down);
        assert_eq!(InputCode::from(3), InputCode::Other(3));
        assert_eq!(u32::from(Down), 25);
    }

    #[test]
    fn test_input_code_serializes_as_number() {
        let code: InputCode = serde_json::from_str("24").unwrap();
        assert_eq!(code, Up);
        assert_eq!(serde_json::to_string(&InputCode::Other(7)).unwrap(), "7");
    }
}
