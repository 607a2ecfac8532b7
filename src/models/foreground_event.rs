use rusqlite::{Connection, Result, params};

/// Kind of foreground transition recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MovedToForeground,
    MovedToBackground,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::MovedToForeground => "foreground",
            EventKind::MovedToBackground => "background",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "foreground" => Some(EventKind::MovedToForeground),
            "background" => Some(EventKind::MovedToBackground),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundEvent {
    pub id: Option<i64>,
    pub timestamp_ms: i64,
    pub app_id: String,
    pub kind: EventKind,
}

impl ForegroundEvent {
    pub fn new(timestamp_ms: i64, app_id: &str, kind: EventKind) -> Self {
        Self {
            id: None,
            timestamp_ms,
            app_id: app_id.to_string(),
            kind,
        }
    }

    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO foreground_events (timestamp_ms, app_id, kind) VALUES (?1, ?2, ?3)",
            params![self.timestamp_ms, self.app_id, self.kind.as_str()],
        )?;
        self.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    /// Find events within `[start, end]`, oldest first. Rows with the same
    /// timestamp keep insertion order.
    pub fn find_in_range(conn: &Connection, start: i64, end: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, timestamp_ms, app_id, kind
             FROM foreground_events WHERE timestamp_ms >= ?1 AND timestamp_ms <= ?2
             ORDER BY timestamp_ms, id"
        )?;

        let rows = stmt.query_map(params![start, end], |row| {
            let kind: String = row.get(3)?;
            let kind = EventKind::parse(&kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("unknown event kind '{kind}'").into(),
                )
            })?;
            Ok(Self {
                id: Some(row.get(0)?),
                timestamp_ms: row.get(1)?,
                app_id: row.get(2)?,
                kind,
            })
        })?;

        rows.collect()
    }

    /// Delete events older than `cutoff`. Returns the number of rows removed.
    pub fn prune_before(conn: &Connection, cutoff: i64) -> Result<usize> {
        conn.execute(
            "DELETE FROM foreground_events WHERE timestamp_ms < ?1",
            params![cutoff],
        )
    }
}
