//! Remote store access
//!
//! The remote store owns the durable copy of the task table. It is reached
//! through the [`RemoteStore`] trait:
//!
//! - `RestStore`: HTTP client for a PostgREST-style table API, with a
//!   WebSocket push channel for change notifications
//! - `MemoryStore`: in-process table for tests and offline sessions
//!
//! ## Usage
//!
//! ```ignore
//! let store = RestStore::new(config.store_settings()?)?;
//! let tasks = store.list().await?;
//!
//! let mut changes = store.subscribe().await?;
//! while let Some(event) = changes.next().await {
//!     // ...
//! }
//! ```

mod error;
mod memory;
mod rest;
mod subscription;

use async_trait::async_trait;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use rest::RestStore;
pub use subscription::{ConnectionStatus, Subscription};

pub(crate) use subscription::SubscriptionParts;

use crate::models::{NewTask, Task, TaskId, TaskPatch};

/// A change broadcast by the store
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A row was created
    Insert(Task),
    /// A row was modified
    Update(Task),
    /// A row was removed
    Delete(TaskId),
}

impl ChangeEvent {
    /// ID of the affected task
    pub fn task_id(&self) -> &TaskId {
        match self {
            ChangeEvent::Insert(task) | ChangeEvent::Update(task) => &task.id,
            ChangeEvent::Delete(id) => id,
        }
    }
}

/// Request/response access to the task table plus its change feed
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All tasks, most recently created first
    async fn list(&self) -> StoreResult<Vec<Task>>;

    /// Create a task; the store assigns `id` and `created_at`
    async fn insert(&self, task: &NewTask) -> StoreResult<Task>;

    /// Patch a task and return the stored record
    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> StoreResult<Task>;

    /// Remove a task (succeeds if it is already gone)
    async fn delete(&self, id: &TaskId) -> StoreResult<()>;

    /// Remove every completed task
    async fn delete_completed(&self) -> StoreResult<()>;

    /// Open the change feed; dropping the subscription closes it
    async fn subscribe(&self) -> StoreResult<Subscription>;
}
