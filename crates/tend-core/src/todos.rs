//! Todo operations
//!
//! [`TodoService`] is the single entry point for changing the task list.
//! Every operation makes one store request and, once the store confirms,
//! dispatches the confirmed record to the reducer. Failures leave the list
//! untouched and are recorded in [`TodoState::error`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::models::{normalize_text, NewTask, Task, TaskId, TaskPatch};
use crate::state::{Action, StateContainer, TodoState};
use crate::store::{ChangeEvent, ConnectionStatus, RemoteStore, StoreError, Subscription};

/// How long to wait for a new change feed to join before loading anyway
pub const JOIN_WAIT: Duration = Duration::from_secs(15);

/// Outcome of adding several tasks at once
#[derive(Debug, Default)]
pub struct BulkAdd {
    /// Tasks the store accepted, in request order
    pub added: Vec<Task>,
    /// Requests that failed
    pub failures: Vec<StoreError>,
}

/// Todo list backed by a remote store
#[derive(Clone)]
pub struct TodoService {
    store: Arc<dyn RemoteStore>,
    state: StateContainer,
}

impl TodoService {
    /// Create a service with an empty list
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_state(store, StateContainer::new())
    }

    /// Create a service over an existing state container
    pub fn with_state(store: Arc<dyn RemoteStore>, state: StateContainer) -> Self {
        Self { store, state }
    }

    /// The shared state container
    pub fn state(&self) -> &StateContainer {
        &self.state
    }

    /// Current state
    pub fn snapshot(&self) -> TodoState {
        self.state.snapshot()
    }

    /// Fetch the full list from the store
    pub async fn load(&self) -> Result<(), StoreError> {
        self.state.dispatch(Action::SetLoading(true));

        match self.store.list().await {
            Ok(tasks) => {
                info!("Loaded {} tasks", tasks.len());
                self.state.dispatch(Action::LoadSuccess(tasks));
                Ok(())
            }
            Err(e) => {
                self.state.dispatch(Action::SetLoading(false));
                Err(self.record_failure("load tasks", e))
            }
        }
    }

    /// Add a task
    ///
    /// Blank text is ignored: no request is made and `Ok(None)` is returned.
    pub async fn add_task(
        &self,
        text: &str,
        ai_generated: bool,
    ) -> Result<Option<Task>, StoreError> {
        let Some(new) = NewTask::new(text, ai_generated) else {
            debug!("Ignoring blank task");
            return Ok(None);
        };

        match self.store.insert(&new).await {
            Ok(task) => {
                debug!("Added task {}", task.id);
                self.state.dispatch(Action::InsertConfirmed(task.clone()));
                Ok(Some(task))
            }
            Err(e) => Err(self.record_failure("add task", e)),
        }
    }

    /// Add several tasks, one request each
    ///
    /// Every item is attempted even if an earlier one fails.
    pub async fn add_tasks<I, S>(&self, texts: I, ai_generated: bool) -> BulkAdd
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = BulkAdd::default();
        for text in texts {
            match self.add_task(text.as_ref(), ai_generated).await {
                Ok(Some(task)) => result.added.push(task),
                Ok(None) => {}
                Err(e) => result.failures.push(e),
            }
        }
        result
    }

    /// Flip a task's completed flag
    ///
    /// Returns `Ok(None)` without a request if the task is not in the list.
    pub async fn toggle_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let Some(completed) = self.state.with(|s| s.get(id).map(|t| t.completed)) else {
            debug!("Toggle ignored, task {} not loaded", id);
            return Ok(None);
        };

        let patch = TaskPatch::completed(!completed);
        self.update(id, &patch, "update task").await.map(Some)
    }

    /// Replace a task's text
    ///
    /// Blank text is ignored: no request is made and `Ok(None)` is returned.
    pub async fn edit_task(&self, id: &TaskId, text: &str) -> Result<Option<Task>, StoreError> {
        let Some(text) = normalize_text(text) else {
            debug!("Ignoring blank edit for task {}", id);
            return Ok(None);
        };

        let patch = TaskPatch::text(text);
        self.update(id, &patch, "edit task").await.map(Some)
    }

    /// Delete a task
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        match self.store.delete(id).await {
            Ok(()) => {
                debug!("Deleted task {}", id);
                self.state.dispatch(Action::DeleteConfirmed(id.clone()));
                Ok(())
            }
            Err(e) => Err(self.record_failure("delete task", e)),
        }
    }

    /// Delete every completed task
    pub async fn clear_completed(&self) -> Result<(), StoreError> {
        match self.store.delete_completed().await {
            Ok(()) => {
                debug!("Cleared completed tasks");
                self.state.dispatch(Action::ClearCompletedConfirmed);
                Ok(())
            }
            Err(e) => Err(self.record_failure("clear completed tasks", e)),
        }
    }

    /// Apply a change pushed by the store
    pub fn apply_change(&self, change: ChangeEvent) {
        debug!("Applying pushed change for task {}", change.task_id());
        self.state.dispatch(change.into());
    }

    /// Open the store's change feed
    pub async fn subscribe(&self) -> Result<Subscription, StoreError> {
        self.store
            .subscribe()
            .await
            .map_err(|e| self.record_failure("subscribe to changes", e))
    }

    /// Load the list once `subscription` has joined
    ///
    /// The feed is open before the fetch starts, so a change made in between
    /// still arrives and the reducer absorbs the overlap. If the feed has not
    /// joined within `join_wait` the list is loaded anyway.
    pub async fn load_when_live(
        &self,
        subscription: &Subscription,
        join_wait: Duration,
    ) -> Result<(), StoreError> {
        if !subscription.wait_connected(join_wait).await {
            warn!("Change feed not connected, loading without it");
        }
        self.load().await
    }

    /// Reload after the change feed rejoins
    ///
    /// Changes made while the feed was down are never replayed.
    pub async fn rejoined(&self) -> Result<(), StoreError> {
        info!("Change feed rejoined, reloading");
        self.load().await
    }

    /// Apply pushed changes until the feed ends, reloading on every rejoin
    pub async fn follow(&self, mut subscription: Subscription) {
        let mut status = subscription.subscribe_status();

        loop {
            tokio::select! {
                change = subscription.next() => match change {
                    Some(change) => self.apply_change(change),
                    None => break,
                },

                Ok(()) = status.changed() => {
                    let current = *status.borrow_and_update();
                    if current == ConnectionStatus::Connected {
                        // Failure is already recorded in the state
                        let _ = self.rejoined().await;
                    }
                }
            }
        }
        debug!("Change feed ended");
    }

    /// Clear the recorded error
    pub fn dismiss_error(&self) {
        self.state.dispatch(Action::SetError(None));
    }

    async fn update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
        what: &str,
    ) -> Result<Task, StoreError> {
        match self.store.update(id, patch).await {
            Ok(task) => {
                debug!("Updated task {}", task.id);
                self.state.dispatch(Action::UpdateConfirmed(task.clone()));
                Ok(task)
            }
            Err(e) => Err(self.record_failure(what, e)),
        }
    }

    fn record_failure(&self, what: &str, error: StoreError) -> StoreError {
        warn!("Failed to {}: {}", what, error);
        self.state
            .dispatch(Action::SetError(Some(format!("Failed to {}: {}", what, error))));
        error
    }
}
