use crate::repository::{Repository, RepositorySnapshot};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            text: text.into(),
        }
    }
}

/// Everything kept between requests for one session.
///
/// `todo_lists` is held as raw JSON so that a stored value with an unexpected
/// shape can be discarded on its own instead of failing the whole session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub todo_lists: Option<serde_json::Value>,
    #[serde(default)]
    pub flash: Vec<FlashMessage>,
    #[serde(default = "Utc::now")]
    pub last_access: DateTime<Utc>,
}

impl Default for SessionData {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionData {
    pub fn new() -> Self {
        Self {
            todo_lists: None,
            flash: Vec::new(),
            last_access: Utc::now(),
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.todo_lists.is_none()
    }

    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_access > max_age
    }

    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }

    /// Rebuilds the session's repository from stored data.
    ///
    /// A session that never stored lists starts out seeded when `seed` is set.
    /// Stored data that fails to parse or validate is dropped and the session
    /// continues with an empty repository.
    pub fn repository(&self, seed: bool) -> Repository {
        let Some(value) = &self.todo_lists else {
            return if seed {
                Repository::seeded()
            } else {
                Repository::new()
            };
        };

        let snapshot = match RepositorySnapshot::deserialize(value) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed session todo lists");
                return Repository::new();
            }
        };

        Repository::try_from(snapshot).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "discarding invalid session todo lists");
            Repository::new()
        })
    }

    pub fn store_repository(&mut self, repository: &Repository) {
        // Serializing plain structs of strings and integers cannot fail.
        self.todo_lists = serde_json::to_value(repository.snapshot()).ok();
    }

    pub fn push_flash(&mut self, message: FlashMessage) {
        self.flash.push(message);
    }

    pub fn take_flash(&mut self) -> Vec<FlashMessage> {
        std::mem::take(&mut self.flash)
    }
}
