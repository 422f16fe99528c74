//! Request handlers for todo lists and todos.
//!
//! Every handler resolves ids first, validates input completely, and only then
//! mutates, so a failed request leaves the repository untouched. Outcomes are
//! also queued as flash messages on the caller's session.

use crate::models::{validate_title, RemovalError, TitleSubject, Todo, TodoList, ValidationError};
use crate::repository::Repository;
use crate::session::{FlashMessage, SessionData, SessionId};
use crate::sort::{sort_todo_lists, sort_todos};
use crate::storage::{SessionStore, StorageError};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;

/// Who a repository belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryScope {
    /// One repository shared by every caller of the process.
    Process,
    /// An independent repository per session, stored with the session.
    Session,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown repository scope: {0}")]
pub struct UnknownScope(String);

impl FromStr for RepositoryScope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process" => Ok(RepositoryScope::Process),
            "session" => Ok(RepositoryScope::Session),
            _ => Err(UnknownScope(s.to_string())),
        }
    }
}

impl RepositoryScope {
    pub fn to_str(self) -> &'static str {
        match self {
            RepositoryScope::Process => "process",
            RepositoryScope::Session => "session",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub scope: RepositoryScope,
    pub seed: bool,
    pub session_max_age: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            scope: RepositoryScope::Session,
            seed: false,
            session_max_age: Duration::days(31),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("Todo list not found: {0}")]
    List(String),
    #[error("Todo {todo_id} not found in list {list_id}")]
    Todo { list_id: String, todo_id: String },
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Removal(#[from] RemovalError),
    #[error("Session storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// A successful mutation: the affected entity and the confirmation shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub message: String,
}

impl<T> Outcome<T> {
    fn new(value: T, message: impl Into<String>) -> Self {
        Self {
            value,
            message: message.into(),
        }
    }
}

/// One list with its todos in display order.
#[derive(Debug, Clone, Serialize)]
pub struct ListView {
    pub list: TodoList,
    pub todos: Vec<Todo>,
}

/// Parses an id received as text. Anything but plain decimal digits is unknown.
pub fn parse_id(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn find_list<'a>(
    repository: &'a Repository,
    list_id: &str,
) -> Result<&'a TodoList, NotFoundError> {
    parse_id(list_id)
        .and_then(|id| repository.find_list(id))
        .ok_or_else(|| NotFoundError::List(list_id.to_string()))
}

fn find_list_mut<'a>(
    repository: &'a mut Repository,
    list_id: &str,
) -> Result<&'a mut TodoList, NotFoundError> {
    parse_id(list_id)
        .and_then(|id| repository.find_list_mut(id))
        .ok_or_else(|| NotFoundError::List(list_id.to_string()))
}

fn todo_not_found(list_id: &str, todo_id: &str) -> NotFoundError {
    NotFoundError::Todo {
        list_id: list_id.to_string(),
        todo_id: todo_id.to_string(),
    }
}

pub struct TodoApp {
    store: Box<dyn SessionStore>,
    options: AppOptions,
    shared: Mutex<Repository>,
}

impl TodoApp {
    pub fn new(store: Box<dyn SessionStore>, options: AppOptions) -> Self {
        let shared = if options.seed {
            Repository::seeded()
        } else {
            Repository::new()
        };

        Self {
            store,
            options,
            shared: Mutex::new(shared),
        }
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    pub fn new_session(&self) -> Result<SessionId, HandlerError> {
        let id = SessionId::new();
        self.store.save(&id, &SessionData::new())?;
        tracing::info!(session = %id, "started session");
        Ok(id)
    }

    pub fn end_session(&self, session: &SessionId) -> Result<(), HandlerError> {
        self.store.destroy(session)?;
        tracing::info!(session = %session, "ended session");
        Ok(())
    }

    pub fn purge_expired_sessions(&self) -> Result<usize, HandlerError> {
        let purged = self.store.purge_expired(self.options.session_max_age)?;
        tracing::info!(purged, "purged expired sessions");
        Ok(purged)
    }

    /// Returns and clears the messages queued for `session`.
    pub fn take_flash(&self, session: &SessionId) -> Result<Vec<FlashMessage>, HandlerError> {
        let mut data = self.load_session(session)?;
        let flash = data.take_flash();
        data.touch();
        self.store.save(session, &data)?;
        Ok(flash)
    }

    fn load_session(&self, session: &SessionId) -> Result<SessionData, StorageError> {
        match self.store.load(session)? {
            Some(data) if data.is_expired(self.options.session_max_age, Utc::now()) => {
                tracing::info!(session = %session, "session expired, starting over");
                Ok(SessionData::new())
            }
            Some(data) => Ok(data),
            None => Ok(SessionData::new()),
        }
    }

    /// Loads the repository for `session`, runs `op` once against it and
    /// persists the session before returning `op`'s result.
    fn with_repository<T>(
        &self,
        session: &SessionId,
        op: impl FnOnce(&mut Repository, &mut SessionData) -> Result<T, HandlerError>,
    ) -> Result<T, HandlerError> {
        let mut data = self.load_session(session)?;

        let result = match self.options.scope {
            RepositoryScope::Session => {
                let mut repository = data.repository(self.options.seed);
                let result = op(&mut repository, &mut data);
                data.store_repository(&repository);
                result
            }
            RepositoryScope::Process => {
                let mut repository = self.shared.lock().map_err(|e| {
                    StorageError::Storage(format!("Failed to lock shared repository: {}", e))
                })?;
                op(&mut *repository, &mut data)
            }
        };

        data.touch();
        self.store.save(session, &data)?;
        result
    }

    fn mutate<T>(
        &self,
        session: &SessionId,
        op: impl FnOnce(&mut Repository) -> Result<Outcome<T>, HandlerError>,
    ) -> Result<Outcome<T>, HandlerError> {
        self.with_repository(session, |repository, data| {
            let result = op(repository);
            match &result {
                Ok(outcome) => {
                    tracing::info!(message = %outcome.message, "request succeeded");
                    data.push_flash(FlashMessage::success(outcome.message.clone()));
                }
                Err(HandlerError::Validation(e)) => {
                    tracing::info!(error = %e, "request rejected");
                    data.push_flash(FlashMessage::error(e.to_string()));
                }
                Err(e) => tracing::info!(error = %e, "request failed"),
            }
            result
        })
    }

    #[tracing::instrument(skip(self, session), fields(session = %session))]
    pub fn list_all(&self, session: &SessionId) -> Result<Vec<TodoList>, HandlerError> {
        self.with_repository(session, |repository, _| {
            Ok(sort_todo_lists(repository.lists())
                .into_iter()
                .cloned()
                .collect())
        })
    }

    #[tracing::instrument(skip(self, session), fields(session = %session))]
    pub fn view_list(&self, session: &SessionId, list_id: &str) -> Result<ListView, HandlerError> {
        self.with_repository(session, |repository, _| {
            let list = find_list(repository, list_id)?;
            Ok(ListView {
                todos: sort_todos(list).into_iter().cloned().collect(),
                list: list.clone(),
            })
        })
    }

    #[tracing::instrument(skip(self, session), fields(session = %session))]
    pub fn create_list(
        &self,
        session: &SessionId,
        title: &str,
    ) -> Result<Outcome<TodoList>, HandlerError> {
        self.mutate(session, |repository| {
            let list = repository.create_list(title)?;
            Ok(Outcome::new(list.clone(), "The todo list has been created."))
        })
    }

    #[tracing::instrument(skip(self, session), fields(session = %session))]
    pub fn rename_list(
        &self,
        session: &SessionId,
        list_id: &str,
        title: &str,
    ) -> Result<Outcome<TodoList>, HandlerError> {
        self.mutate(session, |repository| {
            let id = find_list_mut(repository, list_id)?.id;
            let title = validate_title(title, TitleSubject::List)?;
            if repository.is_title_taken(&title, Some(id)) {
                return Err(ValidationError::DuplicateListTitle(title).into());
            }

            let list = find_list_mut(repository, list_id)?;
            list.set_title(&title)?;
            Ok(Outcome::new(list.clone(), "Todo list updated."))
        })
    }

    #[tracing::instrument(skip(self, session), fields(session = %session))]
    pub fn delete_list(
        &self,
        session: &SessionId,
        list_id: &str,
    ) -> Result<Outcome<TodoList>, HandlerError> {
        self.mutate(session, |repository| {
            let removed = parse_id(list_id)
                .and_then(|id| repository.remove_list(id))
                .ok_or_else(|| NotFoundError::List(list_id.to_string()))?;
            Ok(Outcome::new(removed, "Todo list deleted."))
        })
    }

    #[tracing::instrument(skip(self, session), fields(session = %session))]
    pub fn mark_all_done(
        &self,
        session: &SessionId,
        list_id: &str,
    ) -> Result<Outcome<TodoList>, HandlerError> {
        self.mutate(session, |repository| {
            let list = find_list_mut(repository, list_id)?;
            list.mark_all_done();
            Ok(Outcome::new(
                list.clone(),
                "All todos have been marked as done.",
            ))
        })
    }

    #[tracing::instrument(skip(self, session), fields(session = %session))]
    pub fn add_todo(
        &self,
        session: &SessionId,
        list_id: &str,
        title: &str,
    ) -> Result<Outcome<Todo>, HandlerError> {
        self.mutate(session, |repository| {
            let list = find_list_mut(repository, list_id)?;
            let todo = list.new_todo(title)?;
            list.add(todo.clone());
            Ok(Outcome::new(todo, "The todo has been created."))
        })
    }

    #[tracing::instrument(skip(self, session), fields(session = %session))]
    pub fn toggle_todo(
        &self,
        session: &SessionId,
        list_id: &str,
        todo_id: &str,
    ) -> Result<Outcome<Todo>, HandlerError> {
        self.mutate(session, |repository| {
            let todo = find_list_mut(repository, list_id)
                .ok()
                .zip(parse_id(todo_id))
                .and_then(|(list, id)| list.find_by_id_mut(id))
                .ok_or_else(|| todo_not_found(list_id, todo_id))?;

            let message = if todo.toggle() {
                format!("\"{}\" marked done.", todo.title)
            } else {
                format!("\"{}\" marked as NOT done!", todo.title)
            };
            Ok(Outcome::new(todo.clone(), message))
        })
    }

    #[tracing::instrument(skip(self, session), fields(session = %session))]
    pub fn delete_todo(
        &self,
        session: &SessionId,
        list_id: &str,
        todo_id: &str,
    ) -> Result<Outcome<Todo>, HandlerError> {
        self.mutate(session, |repository| {
            let list = find_list_mut(repository, list_id)
                .map_err(|_| todo_not_found(list_id, todo_id))?;
            let index = parse_id(todo_id)
                .and_then(|id| list.find_index_of(id))
                .ok_or_else(|| todo_not_found(list_id, todo_id))?;
            let removed = list.remove_at(index)?;
            Ok(Outcome::new(removed, "The todo has been deleted."))
        })
    }
}
