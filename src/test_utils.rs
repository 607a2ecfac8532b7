//! Shared test utilities for usagelock.
//!
//! This module provides common setup functions and fakes used across test modules.

#![cfg(test)]

use crate::db::{migrations, Database};
use crate::lock::OverlayPresenter;
use crate::models::{EventKind, ForegroundEvent};
use crate::probe::EventSource;
use crate::error::AppError;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

/// Create a temporary test database with migrations applied.
///
/// Returns a tuple of (Database, TempDir). The TempDir must be kept alive
/// for the duration of the test to prevent the database file from being deleted.
pub fn setup_test_db() -> (Database, TempDir) {
    let dir = tempdir().expect("Failed to create temp directory for test DB");
    let db_path = dir.path().join("test.db");
    let db = Database::open(&db_path).expect("Failed to open test database");
    migrations::run(db.connection()).expect("Failed to run migrations on test DB");
    (db, dir)
}

/// Event source backed by a plain vector.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    pub events: Vec<ForegroundEvent>,
    pub fail: bool,
}

impl MemoryEventSource {
    pub fn with_foreground(entries: &[(i64, &str)]) -> Self {
        Self {
            events: entries
                .iter()
                .map(|(ts, app)| ForegroundEvent::new(*ts, app, EventKind::MovedToForeground))
                .collect(),
            fail: false,
        }
    }
}

impl EventSource for MemoryEventSource {
    fn events_between(&self, start: i64, end: i64) -> Result<Vec<ForegroundEvent>, AppError> {
        if self.fail {
            return Err(AppError::Internal("event source offline".into()));
        }
        let mut events: Vec<_> = self
            .events
            .iter()
            .filter(|e| e.timestamp_ms >= start && e.timestamp_ms <= end)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp_ms);
        Ok(events)
    }
}

/// Counts overlay calls. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingPresenter {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn shows(&self) -> usize {
        self.calls().iter().filter(|c| **c == "show").count()
    }

    pub fn closes(&self) -> usize {
        self.calls().iter().filter(|c| **c == "close").count()
    }
}

impl OverlayPresenter for RecordingPresenter {
    fn show(&mut self) {
        self.calls.lock().unwrap().push("show");
    }

    fn close(&mut self) {
        self.calls.lock().unwrap().push("close");
    }
}
