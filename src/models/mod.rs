use serde::Serialize;
use thiserror::Error;

/// Longest title accepted for a todo or a todo list, counted after trimming.
pub const MAX_TITLE_LENGTH: usize = 100;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub done: bool,
}

impl Todo {
    pub fn new(id: u64, title: &str) -> Result<Self, ValidationError> {
        let title = validate_title(title, TitleSubject::Todo)?;

        Ok(Self {
            id,
            title,
            done: false,
        })
    }

    pub fn mark_done(&mut self) {
        self.done = true;
    }

    pub fn mark_undone(&mut self) {
        self.done = false;
    }

    /// Flips the done flag and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.done = !self.done;
        self.done
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TodoList {
    pub id: u64,
    pub title: String,
    todos: Vec<Todo>,
    next_todo_id: u64,
}

impl TodoList {
    pub fn new(id: u64, title: &str) -> Result<Self, ValidationError> {
        let title = validate_title(title, TitleSubject::List)?;

        Ok(Self {
            id,
            title,
            todos: Vec::new(),
            next_todo_id: 1,
        })
    }

    /// Builds a todo carrying the next unused id of this list. The id stays
    /// reserved even if the todo is never added.
    pub fn new_todo(&mut self, title: &str) -> Result<Todo, ValidationError> {
        let todo = Todo::new(self.next_todo_id, title)?;
        self.next_todo_id = next_id(self.next_todo_id, TitleSubject::Todo)?;
        Ok(todo)
    }

    pub fn add(&mut self, todo: Todo) {
        // A counter saturated at `u64::MAX` marks the id space as used up.
        if todo.id >= self.next_todo_id {
            self.next_todo_id = todo.id.saturating_add(1);
        }
        self.todos.push(todo);
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Todo, RemovalError> {
        if index >= self.todos.len() {
            return Err(RemovalError::OutOfBounds {
                index,
                len: self.todos.len(),
            });
        }
        Ok(self.todos.remove(index))
    }

    pub fn remove_by_id(&mut self, todo_id: u64) -> Option<Todo> {
        let index = self.find_index_of(todo_id)?;
        self.remove_at(index).ok()
    }

    pub fn find_index_of(&self, todo_id: u64) -> Option<usize> {
        self.todos.iter().position(|todo| todo.id == todo_id)
    }

    pub fn find_by_id(&self, todo_id: u64) -> Option<&Todo> {
        self.todos.iter().find(|todo| todo.id == todo_id)
    }

    pub fn find_by_id_mut(&mut self, todo_id: u64) -> Option<&mut Todo> {
        self.todos.iter_mut().find(|todo| todo.id == todo_id)
    }

    pub fn item_at(&self, index: usize) -> Option<&Todo> {
        self.todos.get(index)
    }

    pub fn mark_all_done(&mut self) {
        self.todos.iter_mut().for_each(Todo::mark_done);
    }

    pub fn mark_all_undone(&mut self) {
        self.todos.iter_mut().for_each(Todo::mark_undone);
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), ValidationError> {
        self.title = validate_title(title, TitleSubject::List)?;
        Ok(())
    }

    /// A list counts as done only when it has todos and all of them are done.
    pub fn is_done(&self) -> bool {
        !self.todos.is_empty() && self.todos.iter().all(Todo::is_done)
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn size(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    pub fn done_count(&self) -> usize {
        self.todos.iter().filter(|todo| todo.is_done()).count()
    }

    pub fn next_todo_id(&self) -> u64 {
        self.next_todo_id
    }

    pub(crate) fn reserve_todo_ids_from(&mut self, next: u64) {
        self.next_todo_id = self.next_todo_id.max(next);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSubject {
    Todo,
    List,
}

impl std::fmt::Display for TitleSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TitleSubject::Todo => write!(f, "Todo"),
            TitleSubject::List => write!(f, "List"),
        }
    }
}

/// The counter value following `id`. `u64::MAX` itself is never handed out.
pub(crate) fn next_id(id: u64, subject: TitleSubject) -> Result<u64, ValidationError> {
    id.checked_add(1)
        .ok_or(ValidationError::IdsExhausted(subject))
}

/// Trims `title` and checks it against the shared title rules.
pub fn validate_title(title: &str, subject: TitleSubject) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle(subject));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong {
            subject,
            max: MAX_TITLE_LENGTH,
        });
    }
    Ok(title.to_string())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} title must be provided.")]
    EmptyTitle(TitleSubject),
    #[error("{subject} title must be between 1 and {max} characters.")]
    TitleTooLong { subject: TitleSubject, max: usize },
    #[error("List title must be unique.")]
    DuplicateListTitle(String),
    #[error("{0} ids are exhausted.")]
    IdsExhausted(TitleSubject),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemovalError {
    #[error("Cannot remove todo at index {index}: list has {len} todos")]
    OutOfBounds { index: usize, len: usize },
}
