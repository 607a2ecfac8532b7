//! Foreground probe: answers "which app was most recently brought to the
//! foreground?" from an ordered log of transition events.

use crate::constants::DEFAULT_PROBE_LOOKBACK_MS;
use crate::db::Database;
use crate::error::AppError;
use crate::models::{EventKind, ForegroundEvent};
use log::warn;
use std::sync::{Arc, Mutex, MutexGuard};

/// Result of a foreground query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForegroundApp {
    Known(String),
    Unknown,
}

impl ForegroundApp {
    pub fn is(&self, app_id: &str) -> bool {
        match self {
            ForegroundApp::Known(id) => id == app_id,
            ForegroundApp::Unknown => false,
        }
    }
}

/// A time-range queryable log of foreground transitions.
pub trait EventSource: Send {
    /// Events in `[start, end]`, oldest first.
    fn events_between(&self, start: i64, end: i64) -> Result<Vec<ForegroundEvent>, AppError>;
}

/// Anything that can report the current foreground app at `now`.
pub trait ForegroundQuery {
    fn sample(&self, now: i64) -> ForegroundApp;
}

impl<F> ForegroundQuery for F
where
    F: Fn(i64) -> ForegroundApp,
{
    fn sample(&self, now: i64) -> ForegroundApp {
        self(now)
    }
}

/// Event source reading the shared SQLite event log.
pub struct SqliteEventSource {
    db: Arc<Mutex<Database>>,
}

impl SqliteEventSource {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn lock_db(&self) -> MutexGuard<'_, Database> {
        match self.db.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("SqliteEventSource: database mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl EventSource for SqliteEventSource {
    fn events_between(&self, start: i64, end: i64) -> Result<Vec<ForegroundEvent>, AppError> {
        let db = self.lock_db();
        Ok(ForegroundEvent::find_in_range(db.connection(), start, end)?)
    }
}

/// The app id of the last "moved to foreground" event that is not ours.
pub fn last_foreground_app(events: &[ForegroundEvent], self_app_id: &str) -> ForegroundApp {
    events
        .iter()
        .rev()
        .find(|e| e.kind == EventKind::MovedToForeground && e.app_id != self_app_id)
        .map_or(ForegroundApp::Unknown, |e| ForegroundApp::Known(e.app_id.clone()))
}

pub struct ForegroundProbe {
    source: Box<dyn EventSource>,
    self_app_id: String,
    lookback_ms: i64,
}

impl ForegroundProbe {
    pub fn new(source: Box<dyn EventSource>, self_app_id: &str) -> Self {
        Self {
            source,
            self_app_id: self_app_id.to_string(),
            lookback_ms: DEFAULT_PROBE_LOOKBACK_MS,
        }
    }

    #[must_use]
    pub fn with_lookback(mut self, lookback_ms: i64) -> Self {
        self.lookback_ms = lookback_ms.max(1);
        self
    }

    /// Foreground app according to the events in `[window_start, window_end]`.
    ///
    /// A failing or empty source is a neutral miss, not an error.
    pub fn current_foreground_app(&self, window_start: i64, window_end: i64) -> ForegroundApp {
        match self.source.events_between(window_start, window_end) {
            Ok(events) => last_foreground_app(&events, &self.self_app_id),
            Err(e) => {
                warn!("Foreground probe query failed: {e}");
                ForegroundApp::Unknown
            }
        }
    }
}

impl ForegroundQuery for ForegroundProbe {
    fn sample(&self, now: i64) -> ForegroundApp {
        self.current_foreground_app(now.saturating_sub(self.lookback_ms), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{setup_test_db, MemoryEventSource};

    fn probe(source: MemoryEventSource) -> ForegroundProbe {
        ForegroundProbe::new(Box::new(source), "usagelock")
    }

    #[test]
    fn test_last_foreground_event_wins() {
        let probe = probe(MemoryEventSource::with_foreground(&[
            (100, "editor"),
            (200, "game"),
            (300, "browser"),
        ]));
        assert_eq!(probe.current_foreground_app(0, 1000), ForegroundApp::Known("browser".into()));
    }

    #[test]
    fn test_self_transitions_ignored() {
        let probe = probe(MemoryEventSource::with_foreground(&[
            (100, "game"),
            (200, "usagelock"),
        ]));
        assert_eq!(probe.current_foreground_app(0, 1000), ForegroundApp::Known("game".into()));
    }

    #[test]
    fn test_background_events_ignored() {
        let mut source = MemoryEventSource::with_foreground(&[(100, "game")]);
        source
            .events
            .push(ForegroundEvent::new(200, "browser", EventKind::MovedToBackground));
        let probe = probe(source);
        assert_eq!(probe.current_foreground_app(0, 1000), ForegroundApp::Known("game".into()));
    }

    #[test]
    fn test_window_limits_events() {
        let probe = probe(MemoryEventSource::with_foreground(&[(100, "game"), (900, "browser")]));
        assert_eq!(probe.current_foreground_app(0, 500), ForegroundApp::Known("game".into()));
        assert_eq!(probe.current_foreground_app(200, 500), ForegroundApp::Unknown);
    }

    #[test]
    fn test_empty_window_is_unknown() {
        let probe = probe(MemoryEventSource::default());
        assert_eq!(probe.current_foreground_app(0, 1000), ForegroundApp::Unknown);
    }

    #[test]
    fn test_only_self_events_is_unknown() {
        let probe = probe(MemoryEventSource::with_foreground(&[(100, "usagelock")]));
        assert_eq!(probe.current_foreground_app(0, 1000), ForegroundApp::Unknown);
    }

    #[test]
    fn test_failing_source_is_unknown() {
        let source = MemoryEventSource {
            fail: true,
            ..MemoryEventSource::with_foreground(&[(100, "game")])
        };
        assert_eq!(probe(source).current_foreground_app(0, 1000), ForegroundApp::Unknown);
    }

    #[test]
    fn test_sample_uses_lookback() {
        let probe = probe(MemoryEventSource::with_foreground(&[(1_000, "game")])).with_lookback(500);
        assert_eq!(probe.sample(1_400), ForegroundApp::Known("game".into()));
        assert_eq!(probe.sample(1_600), ForegroundApp::Unknown);
    }

    #[test]
    fn test_sqlite_source() {
        let (db, _dir) = setup_test_db();
        {
            let conn = db.connection();
            ForegroundEvent::new(100, "game", EventKind::MovedToForeground).save(conn).unwrap();
            ForegroundEvent::new(150, "game", EventKind::MovedToBackground).save(conn).unwrap();
            ForegroundEvent::new(150, "usagelock", EventKind::MovedToForeground).save(conn).unwrap();
        }
        let source = SqliteEventSource::new(Arc::new(Mutex::new(db)));
        let probe = ForegroundProbe::new(Box::new(source), "usagelock");
        assert_eq!(probe.current_foreground_app(0, 1000), ForegroundApp::Known("game".into()));
    }

    #[test]
    fn test_foreground_app_is() {
        assert!(ForegroundApp::Known("game".into()).is("game"));
        assert!(!ForegroundApp::Known("game".into()).is("browser"));
        assert!(!ForegroundApp::Unknown.is(""));
    }
}
