use crate::session::{SessionData, SessionId};
use chrono::Duration;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[cfg(test)]
pub(crate) mod test_utils;

pub mod json;
pub mod memory;
pub mod sqlite;

pub use json::JsonSessionStore;
pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    Memory,
    Json,
    Sqlite,
}

impl FromStr for StoreType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreType::Memory),
            "json" => Ok(StoreType::Json),
            "sqlite" => Ok(StoreType::Sqlite),
            _ => Err(StorageError::Storage(format!("Unknown store type: {}", s))),
        }
    }
}

impl StoreType {
    pub fn to_str(self) -> &'static str {
        match self {
            StoreType::Memory => "memory",
            StoreType::Json => "json",
            StoreType::Sqlite => "sqlite",
        }
    }
}

/// Where session state lives between requests.
///
/// Implementations hand out owned copies, so a caller loads, mutates and then
/// saves; nothing is shared between two loaded copies.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &SessionId) -> Result<Option<SessionData>, StorageError>;
    fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), StorageError>;
    fn destroy(&self, id: &SessionId) -> Result<(), StorageError>;
    /// Drops every session idle for longer than `max_age`, returning how many went.
    fn purge_expired(&self, max_age: Duration) -> Result<usize, StorageError>;
}

pub fn create_store(
    store_type: StoreType,
    path: Option<&Path>,
) -> Result<Box<dyn SessionStore>, StorageError> {
    match store_type {
        StoreType::Memory => Ok(Box::new(MemorySessionStore::new())),
        StoreType::Json => {
            let path = path.ok_or_else(|| {
                StorageError::Storage("Session path not configured".to_string())
            })?;
            Ok(Box::new(JsonSessionStore::new(path)))
        }
        StoreType::Sqlite => {
            let store = match path {
                Some(path) => SqliteSessionStore::open(path)?,
                None => SqliteSessionStore::open_in_memory()?,
            };
            Ok(Box::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::{exercise_store, temp_session_path};
    use super::*;

    #[test]
    fn test_store_type_parsing() {
        assert_eq!("JSON".parse::<StoreType>().unwrap(), StoreType::Json);
        assert_eq!("sqlite".parse::<StoreType>().unwrap(), StoreType::Sqlite);
        assert_eq!("memory".parse::<StoreType>().unwrap(), StoreType::Memory);
        assert!(matches!(
            "redis".parse::<StoreType>(),
            Err(StorageError::Storage(_))
        ));
        assert_eq!(StoreType::Sqlite.to_str(), "sqlite");
    }

    #[test]
    fn test_storage_factory() {
        let store = create_store(StoreType::Memory, None).unwrap();
        exercise_store(store.as_ref());

        let (path, _temp_dir) = temp_session_path("sessions.json");
        let store = create_store(StoreType::Json, Some(path.as_path())).unwrap();
        exercise_store(store.as_ref());

        let (path, _temp_dir) = temp_session_path("sessions.db");
        let store = create_store(StoreType::Sqlite, Some(path.as_path())).unwrap();
        exercise_store(store.as_ref());

        let store = create_store(StoreType::Sqlite, None).unwrap();
        exercise_store(store.as_ref());
    }

    #[test]
    fn test_json_store_requires_path() {
        assert!(matches!(
            create_store(StoreType::Json, None),
            Err(StorageError::Storage(_))
        ));
    }
}
