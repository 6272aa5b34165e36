//! Stats command handler

use anyhow::Result;

use tend_core::TodoService;

use super::task::store_failure;
use crate::output::Output;

/// Show completion statistics
pub async fn show(todos: &TodoService, output: &Output) -> Result<()> {
    todos.load().await.map_err(store_failure)?;

    let stats = todos.state().with(|state| state.stats());
    output.print_stats(&stats);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use std::sync::Arc;
    use tend_core::MemoryStore;

    #[tokio::test]
    async fn test_load_failure_includes_hint() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next("offline");
        let todos = TodoService::new(store);

        let err = show(&todos, &Output::new(OutputFormat::Quiet))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("offline"));
        assert!(message.contains("Check your connection and try again."));
    }
}
