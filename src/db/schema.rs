pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS foreground_events (
    id INTEGER PRIMARY KEY,
    timestamp_ms INTEGER NOT NULL,
    app_id TEXT NOT NULL,
    kind TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_foreground_events_timestamp ON foreground_events(timestamp_ms);
"#;
