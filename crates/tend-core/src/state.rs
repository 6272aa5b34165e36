//! Todo state and the reducer that updates it
//!
//! All changes to the in-memory task list go through [`TodoState::apply`].
//! The reducer only ever applies records confirmed by the remote store, and
//! every transition keys on task ID, so a confirmation and the push
//! notification for the same change can arrive in either order (or both)
//! without duplicating or losing anything.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::models::{Task, TaskId};
use crate::store::ChangeEvent;

/// Transitions accepted by the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace the whole list with an authoritative snapshot
    LoadSuccess(Vec<Task>),
    /// A task exists on the server; add it or refresh it
    InsertConfirmed(Task),
    /// A task changed on the server; replace the local record
    UpdateConfirmed(Task),
    /// A task is gone from the server
    DeleteConfirmed(TaskId),
    /// Every completed task is gone from the server
    ClearCompletedConfirmed,
    SetLoading(bool),
    SetError(Option<String>),
}

impl From<ChangeEvent> for Action {
    fn from(event: ChangeEvent) -> Self {
        match event {
            ChangeEvent::Insert(task) => Action::InsertConfirmed(task),
            ChangeEvent::Update(task) => Action::UpdateConfirmed(task),
            ChangeEvent::Delete(id) => Action::DeleteConfirmed(id),
        }
    }
}

/// In-memory view of the todo list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoState {
    /// Tasks, most recent first as of the last load
    pub tasks: Vec<Task>,
    /// A load is in flight
    pub loading: bool,
    /// Last store failure, shown to the user
    pub error: Option<String>,
}

/// Pure transition function
pub fn reduce(mut state: TodoState, action: Action) -> TodoState {
    state.apply(action);
    state
}

impl TodoState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an action in place
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::LoadSuccess(mut tasks) => {
                let mut seen = HashSet::new();
                tasks.retain(|task| seen.insert(task.id.clone()));
                self.tasks = tasks;
                self.loading = false;
            }
            Action::InsertConfirmed(task) => match self.position(&task.id) {
                Some(pos) => self.tasks[pos] = task,
                None => self.tasks.push(task),
            },
            Action::UpdateConfirmed(task) => {
                if let Some(pos) = self.position(&task.id) {
                    self.tasks[pos] = task;
                }
            }
            Action::DeleteConfirmed(id) => {
                self.tasks.retain(|task| task.id != id);
            }
            Action::ClearCompletedConfirmed => {
                self.tasks.retain(|task| !task.completed);
            }
            Action::SetLoading(loading) => {
                self.loading = loading;
            }
            Action::SetError(error) => {
                self.error = error;
            }
        }
    }

    /// Look up a task by ID
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    /// Find tasks whose ID starts with `prefix`
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.id.as_str().starts_with(prefix))
            .collect()
    }

    /// Summary counts for the stats view
    pub fn stats(&self) -> TaskStats {
        let total = self.tasks.len();
        let completed = self.tasks.iter().filter(|t| t.completed).count();
        let ai_generated = self.tasks.iter().filter(|t| t.ai_generated).count();
        let percent_complete = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };

        TaskStats {
            total,
            completed,
            pending: total - completed,
            ai_generated,
            percent_complete,
        }
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| &task.id == id)
    }
}

/// Counts derived from the current list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub ai_generated: usize,
    pub percent_complete: u8,
}

/// Shared owner of the todo state
///
/// Every action goes through [`StateContainer::dispatch`], which applies it
/// under the channel lock and notifies subscribers. Clones share the same
/// state.
#[derive(Clone)]
pub struct StateContainer {
    tx: Arc<watch::Sender<TodoState>>,
}

impl StateContainer {
    /// Create a container holding an empty list
    pub fn new() -> Self {
        Self::with_state(TodoState::default())
    }

    /// Create a container holding the given state
    pub fn with_state(state: TodoState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    /// Apply an action
    pub fn dispatch(&self, action: Action) {
        self.tx.send_modify(|state| state.apply(action));
    }

    /// Clone the current state
    pub fn snapshot(&self) -> TodoState {
        self.tx.borrow().clone()
    }

    /// Read the current state without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&TodoState) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Watch for state changes
    pub fn subscribe(&self) -> watch::Receiver<TodoState> {
        self.tx.subscribe()
    }
}

impl Default for StateContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(id: &str, completed: bool) -> Task {
        let mut task = Task::new(id, format!("task {}", id), false);
        task.completed = completed;
        task
    }

    fn state_with(tasks: Vec<Task>) -> TodoState {
        reduce(TodoState::new(), Action::LoadSuccess(tasks))
    }

    fn ids(state: &TodoState) -> Vec<&str> {
        state.tasks.iter().map(|t| t.id.as_str()).collect()
    }

    fn assert_unique_ids(state: &TodoState) {
        let unique: HashSet<_> = state.tasks.iter().map(|t| &t.id).collect();
        assert_eq!(unique.len(), state.tasks.len());
    }

    #[test]
    fn test_load_success_replaces_and_clears_loading() {
        let mut state = state_with(vec![task("old", false)]);
        state.apply(Action::SetLoading(true));

        state.apply(Action::LoadSuccess(vec![task("b", false), task("a", true)]));

        assert_eq!(ids(&state), vec!["b", "a"]);
        assert!(!state.loading);
    }

    #[test]
    fn test_load_success_drops_duplicate_ids() {
        let mut first = task("1", false);
        first.text = "first".to_string();
        let mut second = task("1", true);
        second.text = "second".to_string();

        let state = state_with(vec![first, task("2", false), second]);

        assert_eq!(ids(&state), vec!["1", "2"]);
        assert_eq!(state.tasks[0].text, "first");
    }

    #[test]
    fn test_insert_appends() {
        let state = state_with(vec![task("1", false)]);
        let state = reduce(state, Action::InsertConfirmed(task("2", false)));
        assert_eq!(ids(&state), vec!["1", "2"]);
    }

    #[test]
    fn test_insert_twice_keeps_one_with_second_payload() {
        let mut second = task("7", false);
        second.text = "second payload".to_string();

        let state = state_with(vec![]);
        let state = reduce(state, Action::InsertConfirmed(task("7", false)));
        let state = reduce(state, Action::InsertConfirmed(second.clone()));

        assert_eq!(state.tasks, vec![second]);
    }

    #[test]
    fn test_insert_existing_keeps_position() {
        let state = state_with(vec![task("1", false), task("2", false), task("3", false)]);
        let state = reduce(state, Action::InsertConfirmed(task("2", true)));

        assert_eq!(ids(&state), vec!["1", "2", "3"]);
        assert!(state.tasks[1].completed);
    }

    #[test]
    fn test_update_replaces_whole_record() {
        let original = task("1", false);
        let mut confirmed = original.clone();
        confirmed.completed = true;
        confirmed.text = "server text".to_string();

        let state = state_with(vec![original, task("2", false)]);
        let state = reduce(state, Action::UpdateConfirmed(confirmed.clone()));

        assert_eq!(state.tasks[0], confirmed);
        assert_eq!(ids(&state), vec!["1", "2"]);
    }

    #[test]
    fn test_update_missing_is_noop() {
        let before = state_with(vec![task("1", false)]);
        let after = reduce(before.clone(), Action::UpdateConfirmed(task("9", true)));
        assert_eq!(before, after);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let state = state_with(vec![task("1", false), task("2", false)]);

        let once = reduce(state, Action::DeleteConfirmed(TaskId::from("1")));
        let twice = reduce(once.clone(), Action::DeleteConfirmed(TaskId::from("1")));

        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["2"]);
    }

    #[test]
    fn test_clear_completed_removes_all_and_only_completed() {
        let state = state_with(vec![
            task("1", true),
            task("2", false),
            task("3", true),
            task("4", false),
        ]);

        let cleared = reduce(state, Action::ClearCompletedConfirmed);
        assert_eq!(ids(&cleared), vec!["2", "4"]);

        let again = reduce(cleared.clone(), Action::ClearCompletedConfirmed);
        assert_eq!(cleared, again);
    }

    #[test]
    fn test_set_error_replaces_previous() {
        let mut state = TodoState::new();
        state.apply(Action::SetError(Some("first".to_string())));
        state.apply(Action::SetError(Some("second".to_string())));
        assert_eq!(state.error.as_deref(), Some("second"));

        state.apply(Action::SetError(None));
        assert!(state.error.is_none());
    }

    #[test]
    fn test_ids_stay_unique_under_redundant_delivery() {
        let mut state = TodoState::new();
        let actions = vec![
            Action::LoadSuccess(vec![task("1", false)]),
            Action::InsertConfirmed(task("2", false)),
            Action::InsertConfirmed(task("2", false)),
            Action::UpdateConfirmed(task("2", true)),
            Action::InsertConfirmed(task("1", true)),
            Action::DeleteConfirmed(TaskId::from("3")),
            Action::InsertConfirmed(task("3", false)),
            Action::UpdateConfirmed(task("3", true)),
            Action::InsertConfirmed(task("3", true)),
            Action::ClearCompletedConfirmed,
            Action::InsertConfirmed(task("2", false)),
        ];

        for action in actions {
            state.apply(action);
            assert_unique_ids(&state);
        }
        assert_eq!(ids(&state), vec!["2"]);
    }

    #[test]
    fn test_change_event_into_action() {
        let t = task("5", false);
        assert_eq!(
            Action::from(ChangeEvent::Insert(t.clone())),
            Action::InsertConfirmed(t.clone())
        );
        assert_eq!(
            Action::from(ChangeEvent::Update(t.clone())),
            Action::UpdateConfirmed(t)
        );
        assert_eq!(
            Action::from(ChangeEvent::Delete(TaskId::from("5"))),
            Action::DeleteConfirmed(TaskId::from("5"))
        );
    }

    #[test]
    fn test_stats() {
        let mut ai = task("3", false);
        ai.ai_generated = true;
        let state = state_with(vec![task("1", true), task("2", false), ai]);

        let stats = state.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.ai_generated, 1);
        assert_eq!(stats.percent_complete, 33);

        assert_eq!(TodoState::new().stats().percent_complete, 0);
    }

    #[test]
    fn test_find_by_prefix() {
        let state = state_with(vec![task("1700a", false), task("1700b", false), task("99", false)]);
        assert_eq!(state.find_by_prefix("1700").len(), 2);
        assert_eq!(state.find_by_prefix("99").len(), 1);
        assert!(state.find_by_prefix("x").is_empty());
    }

    #[test]
    fn test_container_dispatch_and_subscribe() {
        let container = StateContainer::new();
        let mut rx = container.subscribe();

        container.dispatch(Action::InsertConfirmed(task("1", false)));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().tasks.len(), 1);
        assert_eq!(container.with(|s| s.tasks.len()), 1);

        let shared = container.clone();
        shared.dispatch(Action::DeleteConfirmed(TaskId::from("1")));
        assert!(container.snapshot().tasks.is_empty());
    }
}
