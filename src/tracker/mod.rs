use crate::clock::current_timestamp_millis;
use crate::constants::{
    DEFAULT_EVENT_RETENTION_HOURS, DEFAULT_RECORDER_HEARTBEAT_MS, DEFAULT_RECORDER_POLL_MS,
};
use crate::db::Database;
use crate::models::{EventKind, ForegroundEvent};
use crate::platform::{NativeTracker, PlatformTracker};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// How often old events are pruned from the log.
const PRUNE_INTERVAL_MS: i64 = 10 * 60 * 1000;

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub poll_interval_ms: u64,
    pub retention_ms: i64,
    /// Re-log the current app at least this often while it stays in front.
    pub heartbeat_ms: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_RECORDER_POLL_MS,
            retention_ms: DEFAULT_EVENT_RETENTION_HOURS * 60 * 60 * 1000,
            heartbeat_ms: DEFAULT_RECORDER_HEARTBEAT_MS,
        }
    }
}

/// Turns periodic active-window samples into foreground transition events.
#[derive(Debug)]
pub struct ForegroundRecorder {
    current: Option<String>,
    last_logged: i64,
    heartbeat_ms: i64,
    last_prune: Option<i64>,
}

impl Default for ForegroundRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDER_HEARTBEAT_MS)
    }
}

impl ForegroundRecorder {
    pub fn new(heartbeat_ms: i64) -> Self {
        Self {
            current: None,
            last_logged: 0,
            heartbeat_ms: heartbeat_ms.max(1),
            last_prune: None,
        }
    }

    /// Record a sample. Writes transition events when the foreground app
    /// changed, and a repeated foreground event once the current app has
    /// gone a heartbeat without one. Returns whether anything was written.
    pub fn observe(&mut self, conn: &Connection, app_id: Option<&str>, now: i64) -> rusqlite::Result<bool> {
        if self.current.as_deref() == app_id {
            let Some(app_id) = app_id else {
                return Ok(false);
            };
            if now.saturating_sub(self.last_logged) < self.heartbeat_ms {
                return Ok(false);
            }
            ForegroundEvent::new(now, app_id, EventKind::MovedToForeground).save(conn)?;
            self.last_logged = now;
            return Ok(true);
        }

        if let Some(previous) = self.current.as_deref() {
            ForegroundEvent::new(now, previous, EventKind::MovedToBackground).save(conn)?;
        }
        if let Some(app_id) = app_id {
            ForegroundEvent::new(now, app_id, EventKind::MovedToForeground).save(conn)?;
            debug!("Foreground changed to {app_id}");
        }

        self.current = app_id.map(str::to_string);
        self.last_logged = now;
        Ok(true)
    }

    /// Drop events past retention, at most once per prune interval.
    pub fn maybe_prune(&mut self, conn: &Connection, now: i64, retention_ms: i64) -> rusqlite::Result<usize> {
        if self
            .last_prune
            .is_some_and(|last| now.saturating_sub(last) < PRUNE_INTERVAL_MS)
        {
            return Ok(0);
        }
        self.last_prune = Some(now);

        let removed = ForegroundEvent::prune_before(conn, now.saturating_sub(retention_ms))?;
        if removed > 0 {
            info!("Pruned {removed} foreground events past retention");
        }
        Ok(removed)
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

/// Lock the shared database, recovering from poisoning if necessary
fn lock_db(db: &Mutex<Database>) -> MutexGuard<'_, Database> {
    match db.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Tracker: database mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

pub struct TrackerService {
    config: TrackerConfig,
    running: Arc<AtomicBool>,
    db: Arc<Mutex<Database>>,
    platform: Arc<dyn PlatformTracker>,
}

impl TrackerService {
    pub fn new(db: Arc<Mutex<Database>>, config: TrackerConfig) -> Self {
        Self::with_platform(db, Arc::new(NativeTracker::new()), config)
    }

    pub fn with_platform(db: Arc<Mutex<Database>>, platform: Arc<dyn PlatformTracker>, config: TrackerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            db,
            platform,
        }
    }

    pub fn start(&self) -> thread::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let db = Arc::clone(&self.db);
        let platform = Arc::clone(&self.platform);
        let config = self.config;

        thread::spawn(move || {
            let mut recorder = ForegroundRecorder::new(config.heartbeat_ms);

            while running.load(Ordering::SeqCst) {
                let window = platform.get_active_window();
                let now = current_timestamp_millis();

                {
                    let db = lock_db(&db);
                    let conn = db.connection();
                    if let Err(e) = recorder.observe(conn, window.as_ref().map(|w| w.app_id()), now) {
                        warn!("Failed to record foreground event: {e}");
                    }
                    if let Err(e) = recorder.maybe_prune(conn, now, config.retention_ms) {
                        warn!("Failed to prune foreground events: {e}");
                    }
                }

                thread::sleep(Duration::from_millis(config.poll_interval_ms));
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
