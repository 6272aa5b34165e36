//! In-process store
//!
//! Keeps the task table in memory and broadcasts every change to its
//! subscribers, the same way the hosted store does. Used for offline
//! sessions and tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::{ChangeEvent, ConnectionStatus, RemoteStore, StoreError, StoreResult, Subscription};
use crate::models::{NewTask, Task, TaskId, TaskPatch};

/// Capacity of the change broadcast and of each subscription
const CHANGE_BUFFER: usize = 64;

/// In-memory task table
pub struct MemoryStore {
    tasks: Mutex<Vec<Task>>,
    changes: broadcast::Sender<ChangeEvent>,
    /// IDs handed out before falling back to generated ones
    queued_ids: Mutex<VecDeque<TaskId>>,
    /// Error returned by the next request, if set
    fail_next: Mutex<Option<String>>,
    requests: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            tasks: Mutex::new(Vec::new()),
            changes,
            queued_ids: Mutex::new(VecDeque::new()),
            fail_next: Mutex::new(None),
            requests: AtomicUsize::new(0),
        }
    }

    /// Create a store pre-populated with tasks
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::new();
        *lock(&store.tasks) = tasks;
        store
    }

    /// Use `id` for the next inserted task
    pub fn queue_id(&self, id: impl Into<TaskId>) {
        lock(&self.queued_ids).push_back(id.into());
    }

    /// Make the next request fail with `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        *lock(&self.fail_next) = Some(message.into());
    }

    /// Number of requests received (subscriptions excluded)
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Current table contents in insertion order
    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.tasks).clone()
    }

    /// Count a request and return the injected failure, if any
    fn begin_request(&self) -> StoreResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match lock(&self.fail_next).take() {
            Some(message) => Err(StoreError::Unavailable(message)),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> TaskId {
        lock(&self.queued_ids)
            .pop_front()
            .unwrap_or_else(generate_id)
    }

    fn broadcast(&self, event: ChangeEvent) {
        // No receivers is fine
        let _ = self.changes.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Task>> {
        self.begin_request()?;
        let mut tasks = self.tasks();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn insert(&self, new: &NewTask) -> StoreResult<Task> {
        self.begin_request()?;
        let task = Task {
            id: self.next_id(),
            text: new.text.clone(),
            completed: new.completed,
            created_at: Utc::now(),
            ai_generated: new.ai_generated,
        };
        lock(&self.tasks).push(task.clone());
        debug!("Inserted task {}", task.id);
        self.broadcast(ChangeEvent::Insert(task.clone()));
        Ok(task)
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> StoreResult<Task> {
        self.begin_request()?;
        let updated = {
            let mut tasks = lock(&self.tasks);
            let task = tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            task.apply(patch);
            task.clone()
        };
        self.broadcast(ChangeEvent::Update(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        self.begin_request()?;
        let removed = {
            let mut tasks = lock(&self.tasks);
            let before = tasks.len();
            tasks.retain(|t| &t.id != id);
            before != tasks.len()
        };
        if removed {
            self.broadcast(ChangeEvent::Delete(id.clone()));
        }
        Ok(())
    }

    async fn delete_completed(&self) -> StoreResult<()> {
        self.begin_request()?;
        let removed: Vec<TaskId> = {
            let mut tasks = lock(&self.tasks);
            let (done, open): (Vec<Task>, Vec<Task>) =
                tasks.drain(..).partition(|t| t.completed);
            *tasks = open;
            done.into_iter().map(|t| t.id).collect()
        };
        for id in removed {
            self.broadcast(ChangeEvent::Delete(id));
        }
        Ok(())
    }

    async fn subscribe(&self) -> StoreResult<Subscription> {
        let (subscription, parts) = Subscription::pair(CHANGE_BUFFER);
        let mut changes = self.changes.subscribe();
        let _ = parts.status_tx.send(ConnectionStatus::Connected);

        tokio::spawn(async move {
            let super::SubscriptionParts {
                events_tx,
                status_tx,
                mut shutdown_rx,
            } = parts;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    change = changes.recv() => match change {
                        Ok(event) => {
                            if events_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Subscriber fell behind, {} changes skipped", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            let _ = status_tx.send(ConnectionStatus::Disconnected);
        });

        Ok(subscription)
    }
}

/// Timestamp plus a short random suffix
fn generate_id() -> TaskId {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    TaskId::new(format!("{}{}", Utc::now().timestamp_millis(), &suffix[..6]))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_task(text: &str) -> NewTask {
        NewTask::new(text, false).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let store = MemoryStore::new();
        let task = store.insert(&new_task("Buy milk")).await.unwrap();

        assert!(!task.id.as_str().is_empty());
        assert!(task.id.as_str().len() > 6);
        assert_eq!(task.text, "Buy milk");
        assert!(!task.completed);
        assert_eq!(store.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_queued_ids_are_used_first() {
        let store = MemoryStore::new();
        store.queue_id("42");

        let first = store.insert(&new_task("a")).await.unwrap();
        let second = store.insert(&new_task("b")).await.unwrap();

        assert_eq!(first.id.as_str(), "42");
        assert_ne!(second.id.as_str(), "42");
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first() {
        let mut older = Task::new("old", "older", false);
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        let newer = Task::new("new", "newer", false);
        let store = MemoryStore::with_tasks(vec![older, newer]);

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update(&TaskId::from("nope"), &TaskPatch::completed(true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_completed() {
        let mut done = Task::new("1", "done", false);
        done.completed = true;
        let open = Task::new("2", "open", false);
        let store = MemoryStore::with_tasks(vec![done, open]);

        store.delete_completed().await.unwrap();

        let remaining = store.tasks();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.as_str(), "2");
    }

    #[tokio::test]
    async fn test_fail_next_fails_once() {
        let store = MemoryStore::new();
        store.fail_next("network down");

        let err = store.list().await.unwrap_err();
        assert!(err.to_string().contains("network down"));
        assert!(store.list().await.is_ok());
        assert_eq!(store.request_count(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_receives_changes() {
        let store = MemoryStore::new();
        store.queue_id("1");
        let mut sub = store.subscribe().await.unwrap();
        assert_eq!(sub.status(), ConnectionStatus::Connected);

        let task = store.insert(&new_task("watch me")).await.unwrap();
        store
            .update(&task.id, &TaskPatch::completed(true))
            .await
            .unwrap();
        store.delete(&task.id).await.unwrap();
        // Deleting again broadcasts nothing
        store.delete(&task.id).await.unwrap();

        assert!(matches!(sub.next().await, Some(ChangeEvent::Insert(t)) if t.id == task.id));
        assert!(matches!(sub.next().await, Some(ChangeEvent::Update(t)) if t.completed));
        assert_eq!(sub.next().await, Some(ChangeEvent::Delete(task.id.clone())));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_feed() {
        let store = MemoryStore::new();
        let sub = store.subscribe().await.unwrap();
        let mut status = sub.subscribe_status();

        sub.unsubscribe();

        let last = status
            .wait_for(|s| *s == ConnectionStatus::Disconnected)
            .await
            .unwrap();
        assert_eq!(*last, ConnectionStatus::Disconnected);
    }
}
