//! Data models for tend
//!
//! Defines the task record as stored in the remote `todos` table, plus the
//! payloads used to create and patch it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque task identifier assigned by the store
///
/// Persisted stores may hand out numeric keys; they are kept as strings so
/// the rest of the crate never cares which backend produced them.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a task ID from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => TaskId(s),
            RawId::Number(n) => TaskId(n.to_string()),
        })
    }
}

/// A single todo item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,
    /// User-visible text, never empty after trimming
    pub text: String,
    /// Whether the task is done
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    /// When the store created this task
    pub created_at: DateTime<Utc>,
    /// Whether the task came from the suggestion generator
    #[serde(default, deserialize_with = "null_as_default")]
    pub ai_generated: bool,
}

impl Task {
    /// Create a task with a store-assigned ID
    pub fn new(id: impl Into<TaskId>, text: impl Into<String>, ai_generated: bool) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
            created_at: Utc::now(),
            ai_generated,
        }
    }

    /// Apply a partial update in place
    ///
    /// `id`, `created_at` and `ai_generated` are never touched.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(ref text) = patch.text {
            self.text = text.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }
}

/// Payload for creating a task; the store assigns `id` and `created_at`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTask {
    pub text: String,
    pub completed: bool,
    pub ai_generated: bool,
}

impl NewTask {
    /// Build a creation payload, or `None` if the text is blank
    pub fn new(text: &str, ai_generated: bool) -> Option<Self> {
        normalize_text(text).map(|text| Self {
            text,
            completed: false,
            ai_generated,
        })
    }
}

/// Partial update for an existing task
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// Patch that sets the completion flag
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    /// Patch that replaces the text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Trim user input, rejecting blank text
pub fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
