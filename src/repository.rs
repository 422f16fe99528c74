use crate::models::{next_id, validate_title, TitleSubject, Todo, TodoList, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Every todo list visible to one owner, either a session or the whole process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    lists: Vec<TodoList>,
    next_list_id: u64,
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository {
    pub fn new() -> Self {
        Self {
            lists: Vec::new(),
            next_list_id: 1,
        }
    }

    /// A repository preloaded with a few demo lists.
    pub fn seeded() -> Self {
        let mut repository = Self::new();
        let seed: &[(&str, &[(&str, bool)])] = &[
            (
                "Work Todos",
                &[
                    ("Get coffee", true),
                    ("Chat with co-workers", true),
                    ("Duck out of meeting", false),
                ],
            ),
            (
                "Home Todos",
                &[
                    ("Feed the cats", true),
                    ("Go to bed", true),
                    ("Buy milk", true),
                    ("Study for Launch School", true),
                ],
            ),
            ("Additional Todos", &[]),
            ("social todos", &[("Go to Libby's birthday party", false)]),
        ];

        for (title, todos) in seed {
            let Ok(id) = repository.allocate_list_id() else {
                break;
            };
            let Ok(mut list) = TodoList::new(id, title) else {
                continue;
            };
            for (todo_title, done) in todos.iter() {
                if let Ok(mut todo) = list.new_todo(todo_title) {
                    if *done {
                        todo.mark_done();
                    }
                    list.add(todo);
                }
            }
            repository.lists.push(list);
        }

        repository
    }

    fn allocate_list_id(&mut self) -> Result<u64, ValidationError> {
        let id = self.next_list_id;
        self.next_list_id = next_id(id, TitleSubject::List)?;
        Ok(id)
    }

    pub fn lists(&self) -> &[TodoList] {
        &self.lists
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Case-sensitive check against every list title except `except`.
    pub fn is_title_taken(&self, title: &str, except: Option<u64>) -> bool {
        self.lists
            .iter()
            .any(|list| Some(list.id) != except && list.title == title)
    }

    /// Validates `title`, checks uniqueness and appends a new empty list.
    pub fn create_list(&mut self, title: &str) -> Result<&TodoList, ValidationError> {
        let title = validate_title(title, TitleSubject::List)?;
        if self.is_title_taken(&title, None) {
            return Err(ValidationError::DuplicateListTitle(title));
        }

        let list = TodoList::new(self.allocate_list_id()?, &title)?;
        self.push(list);
        Ok(&self.lists[self.lists.len() - 1])
    }

    pub fn push(&mut self, list: TodoList) {
        if list.id >= self.next_list_id {
            self.next_list_id = list.id.saturating_add(1);
        }
        self.lists.push(list);
    }

    pub fn remove_list(&mut self, list_id: u64) -> Option<TodoList> {
        let index = self.lists.iter().position(|list| list.id == list_id)?;
        Some(self.lists.remove(index))
    }

    pub fn find_list(&self, list_id: u64) -> Option<&TodoList> {
        self.lists.iter().find(|list| list.id == list_id)
    }

    pub fn find_list_mut(&mut self, list_id: u64) -> Option<&mut TodoList> {
        self.lists.iter_mut().find(|list| list.id == list_id)
    }

    pub fn find_todo(&self, list_id: u64, todo_id: u64) -> Option<&Todo> {
        self.find_list(list_id)?.find_by_id(todo_id)
    }

    pub fn find_todo_mut(&mut self, list_id: u64, todo_id: u64) -> Option<&mut Todo> {
        self.find_list_mut(list_id)?.find_by_id_mut(todo_id)
    }

    pub fn snapshot(&self) -> RepositorySnapshot {
        RepositorySnapshot {
            next_list_id: Some(self.next_list_id),
            lists: self
                .lists
                .iter()
                .map(|list| RawTodoList {
                    id: list.id,
                    title: list.title.clone(),
                    next_todo_id: Some(list.next_todo_id()),
                    todos: list
                        .todos()
                        .iter()
                        .map(|todo| RawTodo {
                            id: todo.id,
                            title: todo.title.clone(),
                            done: todo.done,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Serialized form of a [`Repository`] as kept in a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    #[serde(default)]
    pub next_list_id: Option<u64>,
    pub lists: Vec<RawTodoList>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTodoList {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub next_todo_id: Option<u64>,
    #[serde(default)]
    pub todos: Vec<RawTodo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTodo {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Invalid title in stored data: {0}")]
    InvalidTitle(#[from] ValidationError),
    #[error("Duplicate todo list id in stored data: {0}")]
    DuplicateListId(u64),
    #[error("Duplicate todo id {todo_id} in stored list {list_id}")]
    DuplicateTodoId { list_id: u64, todo_id: u64 },
    #[error("Duplicate todo list title in stored data: {0}")]
    DuplicateListTitle(String),
    #[error("Stored id {0} is out of range")]
    IdOverflow(u64),
}

/// Ids handed out by the counters stay below `u64::MAX`, so a stored id or
/// counter at that value cannot have come from this crate.
fn check_stored_id(id: u64) -> Result<u64, SnapshotError> {
    if id == u64::MAX {
        return Err(SnapshotError::IdOverflow(id));
    }
    Ok(id)
}

impl TryFrom<RepositorySnapshot> for Repository {
    type Error = SnapshotError;

    /// Rebuilds validated domain objects from stored data.
    ///
    /// Stored counters are honoured when present; otherwise they restart just
    /// past the largest id seen.
    fn try_from(snapshot: RepositorySnapshot) -> Result<Self, Self::Error> {
        let mut repository = Repository::new();
        let mut list_ids = HashSet::new();

        for raw_list in snapshot.lists {
            if !list_ids.insert(check_stored_id(raw_list.id)?) {
                return Err(SnapshotError::DuplicateListId(raw_list.id));
            }

            let mut list = TodoList::new(raw_list.id, &raw_list.title)?;
            if repository.is_title_taken(&list.title, None) {
                return Err(SnapshotError::DuplicateListTitle(list.title));
            }

            let mut todo_ids = HashSet::new();
            for raw_todo in raw_list.todos {
                if !todo_ids.insert(check_stored_id(raw_todo.id)?) {
                    return Err(SnapshotError::DuplicateTodoId {
                        list_id: raw_list.id,
                        todo_id: raw_todo.id,
                    });
                }
                let mut todo = Todo::new(raw_todo.id, &raw_todo.title)?;
                if raw_todo.done {
                    todo.mark_done();
                }
                list.add(todo);
            }
            if let Some(next) = raw_list.next_todo_id {
                list.reserve_todo_ids_from(check_stored_id(next)?);
            }
            repository.push(list);
        }

        if let Some(next) = snapshot.next_list_id {
            repository.next_list_id = repository.next_list_id.max(check_stored_id(next)?);
        }

        Ok(repository)
    }
}
