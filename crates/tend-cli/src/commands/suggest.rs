//! Suggestion command handlers

use anyhow::Result;

use tend_core::{Config, Suggester, TodoService};

use super::task::store_failure;
use crate::output::Output;

/// Suggest tasks for some input, optionally adding them
pub async fn suggest(config: &Config, input: &str, add: bool, output: &Output) -> Result<()> {
    let suggester = Suggester::new(config.suggest_delay(), config.plan_delay());

    output.message("Thinking...");
    let items = suggester.suggestions(input).await;
    report(&suggester, &items, output);

    if add {
        let todos = crate::open_todos(config, output)?;
        accept(&todos, &items, output).await?;
    }
    Ok(())
}

/// Generate a checklist for a topic, optionally adding it
pub async fn plan(config: &Config, topic: &str, add: bool, output: &Output) -> Result<()> {
    let suggester = Suggester::new(config.suggest_delay(), config.plan_delay());

    output.message("Planning...");
    let items = suggester.plan(topic).await;
    report(&suggester, &items, output);

    if add {
        let todos = crate::open_todos(config, output)?;
        accept(&todos, &items, output).await?;
    }
    Ok(())
}

/// Add accepted suggestions as AI-generated tasks
pub(crate) async fn accept(todos: &TodoService, items: &[String], output: &Output) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let result = todos.add_tasks(items, true).await;

    if !result.added.is_empty() {
        output.success(&format!("Added {} task(s)", result.added.len()));
    }
    if let Some(error) = result.failures.into_iter().last() {
        // Every item was attempted; report the most recent failure
        return Err(store_failure(error));
    }
    Ok(())
}

fn report(suggester: &Suggester, items: &[String], output: &Output) {
    if let Some(error) = suggester.status().error {
        output.warn(&error);
    }
    output.print_suggestions(items);
}
