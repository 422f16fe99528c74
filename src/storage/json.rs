use super::{SessionStore, StorageError};
use crate::session::{SessionData, SessionId};
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// Entries stay raw so that one unreadable session does not take the others down.
type SessionFile = BTreeMap<String, serde_json::Value>;

fn decode(id: &str, value: serde_json::Value) -> Option<SessionData> {
    match serde_json::from_value(value) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!(session = %id, error = %e, "discarding malformed session entry");
            None
        }
    }
}

/// All sessions in a single pretty-printed JSON file keyed by session id.
pub struct JsonSessionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file within this process.
    lock: Mutex<()>,
}

impl JsonSessionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = PathBuf::from(shellexpand::tilde(&path.as_ref().to_string_lossy()).to_string());
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<SessionFile, StorageError> {
        if !self.path.exists() {
            return Ok(SessionFile::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(SessionFile::new());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, sessions: &SessionFile) -> Result<(), StorageError> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(sessions)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), sessions = sessions.len(), "wrote session file");
        Ok(())
    }

    fn update<T>(&self, f: impl FnOnce(&mut SessionFile) -> T) -> Result<T, StorageError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| StorageError::Storage(format!("Failed to lock session file: {}", e)))?;
        let mut sessions = self.read()?;
        let result = f(&mut sessions);
        self.write(&sessions)?;
        Ok(result)
    }
}

impl SessionStore for JsonSessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<SessionData>, StorageError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| StorageError::Storage(format!("Failed to lock session file: {}", e)))?;
        let id = id.to_string();
        Ok(self
            .read()?
            .remove(&id)
            .and_then(|value| decode(&id, value)))
    }

    fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), StorageError> {
        let value = serde_json::to_value(data)?;
        self.update(|sessions| {
            sessions.insert(id.to_string(), value);
        })
    }

    fn destroy(&self, id: &SessionId) -> Result<(), StorageError> {
        self.update(|sessions| {
            sessions.remove(&id.to_string());
        })
    }

    fn purge_expired(&self, max_age: Duration) -> Result<usize, StorageError> {
        let now = Utc::now();
        self.update(|sessions| {
            let before = sessions.len();
            // An entry that cannot be read cannot be aged either, so it goes too.
            sessions.retain(|id, value| {
                decode(id, value.clone()).is_some_and(|data| !data.is_expired(max_age, now))
            });
            before - sessions.len()
        })
    }
}
