//! Task command handlers

use anyhow::{anyhow, bail, Result};

use tend_core::{StoreError, TaskId, TodoService, TodoState};

use crate::output::Output;
use crate::prompt::confirm;

/// List all tasks
pub async fn list(todos: &TodoService, output: &Output) -> Result<()> {
    todos.load().await.map_err(store_failure)?;

    todos.state().with(|state| output.print_tasks(&state.tasks));
    Ok(())
}

/// Add a task
pub async fn add(
    todos: &TodoService,
    text: &str,
    ai_generated: bool,
    output: &Output,
) -> Result<()> {
    match todos.add_task(text, ai_generated).await.map_err(store_failure)? {
        Some(task) => {
            output.success(&format!("Added task: {}", task.id));
            output.print_task(&task);
        }
        None => output.message("Nothing to add."),
    }
    Ok(())
}

/// Toggle a task's completed flag
pub async fn toggle(todos: &TodoService, id: &str, output: &Output) -> Result<()> {
    todos.load().await.map_err(store_failure)?;
    let id = todos.state().with(|state| resolve_id(state, id))?;

    let task = todos
        .toggle_task(&id)
        .await
        .map_err(store_failure)?
        .ok_or_else(|| anyhow!("Task not found: {}", id))?;

    if task.completed {
        output.success(&format!("Completed: {}", task.text));
    } else {
        output.success(&format!("Reopened: {}", task.text));
    }
    Ok(())
}

/// Replace a task's text
pub async fn edit(todos: &TodoService, id: &str, text: &str, output: &Output) -> Result<()> {
    todos.load().await.map_err(store_failure)?;
    let id = todos.state().with(|state| resolve_id(state, id))?;

    match todos.edit_task(&id, text).await.map_err(store_failure)? {
        Some(task) => {
            output.success("Task updated");
            output.print_task(&task);
        }
        None => output.message("Text is empty; task left unchanged."),
    }
    Ok(())
}

/// Delete a task
pub async fn delete(todos: &TodoService, id: &str, output: &Output) -> Result<()> {
    todos.load().await.map_err(store_failure)?;
    let id = todos.state().with(|state| resolve_id(state, id))?;

    todos.delete_task(&id).await.map_err(store_failure)?;

    output.success(&format!("Deleted task: {}", id));
    Ok(())
}

/// Delete all completed tasks
pub async fn clear(todos: &TodoService, yes: bool, output: &Output) -> Result<()> {
    todos.load().await.map_err(store_failure)?;

    let done = todos.state().with(|state| state.stats().completed);
    if done == 0 {
        output.message("No completed tasks.");
        return Ok(());
    }

    // Confirm deletion
    if !yes && output.should_prompt() {
        println!("Delete {} completed task(s)", done);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    todos.clear_completed().await.map_err(store_failure)?;

    output.success(&format!("Cleared {} completed task(s)", done));
    Ok(())
}

/// Resolve a task ID (supports full ID or prefix)
pub(crate) fn resolve_id(state: &TodoState, id: &str) -> Result<TaskId> {
    let id = id.trim();
    if id.is_empty() {
        bail!("Task ID is required");
    }

    // Exact match first; short numeric IDs can prefix longer ones
    let exact = TaskId::from(id);
    if state.get(&exact).is_some() {
        return Ok(exact);
    }

    let matches = state.find_by_prefix(id);

    match matches.len() {
        0 => bail!("No task found matching: {}", id),
        1 => Ok(matches[0].id.clone()),
        _ => {
            eprintln!("Multiple tasks match '{}':", id);
            for task in &matches {
                eprintln!("  {} - {}", task.id, task.text);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Turn a store error into a CLI error with a recovery hint
pub(crate) fn store_failure(error: StoreError) -> anyhow::Error {
    match error.recovery_suggestion() {
        Some(hint) => anyhow!("{}\n  {}", error, hint),
        None => anyhow!(error),
    }
}
