use super::{SessionStore, StorageError};
use crate::session::{SessionData, SessionId};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Sessions held only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<SessionId, SessionData>>, StorageError> {
        self.sessions
            .lock()
            .map_err(|e| StorageError::Storage(format!("Failed to lock sessions: {}", e)))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<SessionData>, StorageError> {
        Ok(self.sessions()?.get(id).cloned())
    }

    fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), StorageError> {
        self.sessions()?.insert(*id, data.clone());
        Ok(())
    }

    fn destroy(&self, id: &SessionId) -> Result<(), StorageError> {
        self.sessions()?.remove(id);
        Ok(())
    }

    fn purge_expired(&self, max_age: Duration) -> Result<usize, StorageError> {
        let now = Utc::now();
        let mut sessions = self.sessions()?;
        let before = sessions.len();
        sessions.retain(|_, data| !data.is_expired(max_age, now));
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::{exercise_store, exercise_purge};

    #[test]
    fn test_memory_store() {
        exercise_store(&MemorySessionStore::new());
    }

    #[test]
    fn test_memory_store_purge() {
        exercise_purge(&MemorySessionStore::new());
    }

    #[test]
    fn test_loaded_copies_are_independent() {
        let store = MemorySessionStore::new();
        let id = SessionId::new();
        store.save(&id, &SessionData::new()).unwrap();

        let mut copy = store.load(&id).unwrap().unwrap();
        copy.push_flash(crate::session::FlashMessage::info("unsaved"));
        assert!(store.load(&id).unwrap().unwrap().flash.is_empty());
    }
}
