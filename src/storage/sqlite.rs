use super::{SessionStore, StorageError};
use crate::session::{SessionData, SessionId};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const INIT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    last_access TEXT NOT NULL
);
"#;

pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = PathBuf::from(shellexpand::tilde(&path.as_ref().to_string_lossy()).to_string());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)
            .map_err(|e| StorageError::Storage(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    /// A store that disappears with the process.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Storage(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(INIT_SCHEMA)
            .map_err(|e| StorageError::Storage(format!("Failed to create sessions table: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn get_connection(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Storage(format!("Failed to lock connection: {}", e)))
    }
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<SessionData>, StorageError> {
        let conn = self.get_connection()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM sessions WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(json) = data else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                tracing::warn!(session = %id, error = %e, "discarding malformed session row");
                Ok(None)
            }
        }
    }

    fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), StorageError> {
        let json = serde_json::to_string(data)?;
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO sessions (id, data, last_access) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, last_access = excluded.last_access",
            params![id.to_string(), json, data.last_access.to_rfc3339()],
        )?;
        tracing::debug!(session = %id, "saved session row");
        Ok(())
    }

    fn destroy(&self, id: &SessionId) -> Result<(), StorageError> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])?;
        Ok(())
    }

    fn purge_expired(&self, max_age: Duration) -> Result<usize, StorageError> {
        let now = Utc::now();
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        let expired: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id, last_access FROM sessions")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut expired = Vec::new();
            for row in rows {
                let (id, last_access) = row?;
                // Rows with an unreadable timestamp cannot be aged, so they go too.
                let is_expired = DateTime::parse_from_rfc3339(&last_access)
                    .map(|dt| now - dt.with_timezone(&Utc) > max_age)
                    .unwrap_or(true);
                if is_expired {
                    expired.push(id);
                }
            }
            expired
        };

        for id in &expired {
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        }
        tx.commit()?;

        Ok(expired.len())
    }
}
