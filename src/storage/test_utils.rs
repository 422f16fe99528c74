use crate::repository::Repository;
use crate::session::{FlashMessage, SessionData, SessionId};
use crate::storage::SessionStore;
use chrono::{Duration, Utc};
use std::path::PathBuf;
use tempfile::TempDir;

/// A path inside a fresh temporary directory; keep the `TempDir` alive while
/// the path is in use.
pub fn temp_session_path(file_name: &str) -> (PathBuf, TempDir) {
    let temp_dir = tempfile::Builder::new()
        .prefix("todos_test")
        .tempdir()
        .expect("Failed to create temporary directory");
    let path = temp_dir.path().join(file_name);
    (path, temp_dir)
}

pub fn session_with_list(title: &str) -> SessionData {
    let mut repository = Repository::new();
    repository
        .create_list(title)
        .expect("Failed to create test list");
    let mut data = SessionData::new();
    data.store_repository(&repository);
    data
}

/// Runs the save/load/destroy cycle every store has to support.
pub fn exercise_store(store: &dyn SessionStore) {
    let id = SessionId::new();
    let other = SessionId::new();
    assert!(store.load(&id).unwrap().is_none());

    let mut data = session_with_list("Work");
    data.push_flash(FlashMessage::success("The todo list has been created."));
    store.save(&id, &data).unwrap();
    store.save(&other, &SessionData::new()).unwrap();

    let loaded = store.load(&id).unwrap().expect("session should exist");
    let repository = loaded.repository(false);
    assert_eq!(repository.len(), 1);
    assert_eq!(repository.lists()[0].title, "Work");
    assert_eq!(loaded.flash, data.flash);

    // Saving again replaces the previous state.
    store.save(&id, &SessionData::new()).unwrap();
    assert!(store.load(&id).unwrap().unwrap().is_fresh());

    store.destroy(&id).unwrap();
    assert!(store.load(&id).unwrap().is_none());
    assert!(store.load(&other).unwrap().is_some());
}

pub fn exercise_purge(store: &dyn SessionStore) {
    let stale = SessionId::new();
    let active = SessionId::new();

    let mut old = SessionData::new();
    old.last_access = Utc::now() - Duration::days(40);
    store.save(&stale, &old).unwrap();
    store.save(&active, &SessionData::new()).unwrap();

    assert_eq!(store.purge_expired(Duration::days(31)).unwrap(), 1);
    assert!(store.load(&stale).unwrap().is_none());
    assert!(store.load(&active).unwrap().is_some());
}
