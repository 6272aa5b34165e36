//! Watch command handler

use anyhow::Result;
use tracing::info;

use tend_core::{ConnectionStatus, TodoService, JOIN_WAIT};

use super::task::store_failure;
use crate::output::Output;

/// Print the list, then every change until Ctrl-C
///
/// The feed is joined before the list is fetched, and the list is fetched
/// again whenever the feed reconnects.
pub async fn watch(todos: &TodoService, output: &Output) -> Result<()> {
    let mut subscription = todos.subscribe().await.map_err(store_failure)?;
    let mut status = subscription.subscribe_status();

    todos
        .load_when_live(&subscription, JOIN_WAIT)
        .await
        .map_err(store_failure)?;
    status.borrow_and_update();
    todos.state().with(|state| output.print_tasks(&state.tasks));
    output.message("Watching for changes (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }

            change = subscription.next() => match change {
                Some(change) => {
                    output.print_change(&change);
                    todos.apply_change(change);
                }
                None => {
                    output.warn("Change feed closed.");
                    break;
                }
            },

            Ok(()) = status.changed() => {
                let current = *status.borrow_and_update();
                output.print_connection(current);
                if current == ConnectionStatus::Connected {
                    match todos.rejoined().await {
                        Ok(()) => todos.state().with(|state| output.print_tasks(&state.tasks)),
                        Err(e) => output.warn(&store_failure(e).to_string()),
                    }
                }
            }
        }
    }

    subscription.unsubscribe();
    Ok(())
}
