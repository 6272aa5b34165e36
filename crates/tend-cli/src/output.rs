//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::collections::HashSet;

use serde::Serialize;

use tend_core::time::relative_to_now;
use tend_core::{ChangeEvent, ConnectionStatus, Task, TaskStats};

/// Fewest characters of the task ID shown in lists
const SHORT_ID_LEN: usize = 8;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single task
    pub fn print_task(&self, task: &Task) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", task.id);
                println!("Text:      {}", task.text);
                println!(
                    "Status:    {}",
                    if task.completed { "done" } else { "pending" }
                );
                if task.ai_generated {
                    println!("Source:    suggestion");
                }
                println!(
                    "Created:   {} ({})",
                    task.created_at.format("%Y-%m-%d %H:%M"),
                    relative_to_now(task.created_at)
                );
            }
            OutputFormat::Json => print_json(task),
            OutputFormat::Quiet => {
                println!("{}", task.id);
            }
        }
    }

    /// Print a list of tasks
    pub fn print_tasks(&self, tasks: &[Task]) {
        match self.format {
            OutputFormat::Human => {
                if tasks.is_empty() {
                    println!("No tasks yet.");
                    return;
                }
                let width = id_width(tasks);
                for task in tasks {
                    println!("{}", task_line(task, width));
                }
                let done = tasks.iter().filter(|t| t.completed).count();
                println!("\n{} task(s), {} done", tasks.len(), done);
            }
            OutputFormat::Json => print_json(&tasks),
            OutputFormat::Quiet => {
                for task in tasks {
                    println!("{}", task.id);
                }
            }
        }
    }

    /// Print generated suggestions
    pub fn print_suggestions(&self, items: &[String]) {
        match self.format {
            OutputFormat::Human => {
                if items.is_empty() {
                    println!("No suggestions.");
                    return;
                }
                for (i, item) in items.iter().enumerate() {
                    println!("{:>2}. {}", i + 1, item);
                }
            }
            OutputFormat::Json => print_json(&items),
            OutputFormat::Quiet => {
                for item in items {
                    println!("{}", item);
                }
            }
        }
    }

    /// Print list statistics
    pub fn print_stats(&self, stats: &TaskStats) {
        match self.format {
            OutputFormat::Human => {
                println!("Total:        {}", stats.total);
                println!("Completed:    {}", stats.completed);
                println!("Pending:      {}", stats.pending);
                println!("AI generated: {}", stats.ai_generated);
                println!(
                    "Progress:     {} {}%",
                    progress_bar(stats.percent_complete, 20),
                    stats.percent_complete
                );
            }
            OutputFormat::Json => print_json(stats),
            OutputFormat::Quiet => {
                println!("{}/{}", stats.completed, stats.total);
            }
        }
    }

    /// Print a change received from the push channel
    pub fn print_change(&self, change: &ChangeEvent) {
        match self.format {
            OutputFormat::Human => match change {
                ChangeEvent::Insert(task) => println!("+ {}", task_line(task, full_width(task))),
                ChangeEvent::Update(task) => println!("~ {}", task_line(task, full_width(task))),
                ChangeEvent::Delete(id) => println!("- {}", id),
            },
            OutputFormat::Json => {
                let value = match change {
                    ChangeEvent::Insert(task) => {
                        serde_json::json!({"event": "insert", "task": task})
                    }
                    ChangeEvent::Update(task) => {
                        serde_json::json!({"event": "update", "task": task})
                    }
                    ChangeEvent::Delete(id) => serde_json::json!({"event": "delete", "id": id}),
                };
                println!("{}", value);
            }
            OutputFormat::Quiet => {
                println!("{}", change.task_id());
            }
        }
    }

    /// Print a push channel status change
    pub fn print_connection(&self, status: ConnectionStatus) {
        let label = match status {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        };
        match self.format {
            OutputFormat::Human => eprintln!("[live: {}]", label),
            OutputFormat::Json => println!("{}", serde_json::json!({"connection": label})),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (shown in every mode but quiet)
    pub fn warn(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

/// One-line summary used in lists and change feeds
///
/// The ID is cut to `width` characters.
fn task_line(task: &Task, width: usize) -> String {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    let ai = if task.ai_generated { " (AI)" } else { "" };
    format!(
        "{:<width$} {} {}{} · {}",
        id_prefix(task.id.as_str(), width),
        mark,
        truncate(&task.text, 50),
        ai,
        relative_to_now(task.created_at),
        width = width
    )
}

/// ID width that tells every listed task apart
///
/// Starts at [`SHORT_ID_LEN`] and grows until no two prefixes collide, so
/// each shown ID resolves back to exactly one task.
fn id_width(tasks: &[Task]) -> usize {
    let longest = tasks.iter().map(full_width).max().unwrap_or(0);
    (SHORT_ID_LEN..longest)
        .find(|&width| {
            let mut seen = HashSet::new();
            tasks
                .iter()
                .all(|task| seen.insert(id_prefix(task.id.as_str(), width)))
        })
        .unwrap_or_else(|| longest.max(SHORT_ID_LEN))
}

fn full_width(task: &Task) -> usize {
    task.id.as_str().chars().count()
}

/// First `width` characters of an ID
fn id_prefix(id: &str, width: usize) -> &str {
    match id.char_indices().nth(width) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn progress_bar(percent: u8, width: usize) -> String {
    let filled = (usize::from(percent.min(100)) * width) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ünïcödé text here", 8), "ünïcö...");
    }

    #[test]
    fn test_id_prefix() {
        assert_eq!(id_prefix("42", SHORT_ID_LEN), "42");
        assert_eq!(id_prefix("1714557600123abcdef", SHORT_ID_LEN), "17145576");
    }

    #[test]
    fn test_id_width_grows_past_shared_prefix() {
        let tasks = vec![
            Task::new("1714557600123abcdef", "a", false),
            Task::new("1714557699999abcdef", "b", false),
            Task::new("42", "c", false),
        ];
        // The two long IDs first differ at the 9th character
        assert_eq!(id_width(&tasks), 9);

        let apart = vec![
            Task::new("1714557600123abcdef", "a", false),
            Task::new("2000000000000abcdef", "b", false),
        ];
        assert_eq!(id_width(&apart), SHORT_ID_LEN);
        assert_eq!(id_width(&[]), SHORT_ID_LEN);
    }

    #[tokio::test]
    async fn test_listed_ids_resolve() {
        use crate::commands::task::resolve_id;
        use std::sync::Arc;
        use tend_core::{MemoryStore, TodoService};

        // Generated IDs created together share their leading digits
        let todos = TodoService::new(Arc::new(MemoryStore::new()));
        for text in ["one", "two", "three", "four"] {
            todos.add_task(text, false).await.unwrap();
        }

        let state = todos.snapshot();
        let width = id_width(&state.tasks);
        for task in &state.tasks {
            let shown = id_prefix(task.id.as_str(), width);
            assert!(task_line(task, width).starts_with(shown));
            assert_eq!(resolve_id(&state, shown).unwrap(), task.id);
        }
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0, 4), "[----]");
        assert_eq!(progress_bar(50, 4), "[##--]");
        assert_eq!(progress_bar(100, 4), "[####]");
    }

    #[test]
    fn test_task_line() {
        let mut task = Task::new("42", "buy milk", true);
        task.completed = true;
        let line = task_line(&task, SHORT_ID_LEN);
        assert!(line.starts_with("42       [x]"));
        assert!(line.contains("[x] buy milk (AI)"));
        assert!(line.ends_with("just now"));
    }
}
