//! Interactive shell
//!
//! Reads commands from stdin while applying pushed changes in the
//! background, so the list stays current with other clients. The list is
//! fetched once the change feed has joined, and again after every
//! reconnect. The change feed is released when the shell exits.

use std::io::Write;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, warn};

use tend_core::{
    ChangeEvent, Config, ConnectionStatus, Subscription, Suggester, TodoService, JOIN_WAIT,
};

use super::suggest::accept;
use super::task::{resolve_id, store_failure};
use crate::output::Output;

const HELP: &str = "\
Commands:
  list                 Show all tasks
  add <text>           Add a task
  toggle <id>          Mark a task done or not done
  edit <id> <text>     Replace a task's text
  rm <id>              Delete a task
  clear                Delete completed tasks
  suggest <text>       Suggest related tasks
  plan <topic>         Generate a checklist
  accept [n ...]       Add the last suggestions (all, or by number)
  stats                Show progress
  status               Show connection and last error
  dismiss              Clear the last error
  quit                 Leave the shell";

/// A parsed shell line
#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Help,
    List,
    Add(String),
    Toggle(String),
    Edit(String, String),
    Delete(String),
    Clear,
    Suggest(String),
    Plan(String),
    Accept(Vec<usize>),
    Stats,
    Status,
    Dismiss,
    Quit,
}

fn parse_line(line: &str) -> Result<Option<ShellCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "help" | "?" => ShellCommand::Help,
        "list" | "ls" => ShellCommand::List,
        "add" => ShellCommand::Add(rest.to_string()),
        "toggle" | "done" => ShellCommand::Toggle(required(rest, "toggle <id>")?),
        "edit" => {
            let Some((id, text)) = rest.split_once(char::is_whitespace) else {
                bail!("Usage: edit <id> <text>");
            };
            ShellCommand::Edit(id.to_string(), text.to_string())
        }
        "rm" | "delete" => ShellCommand::Delete(required(rest, "rm <id>")?),
        "clear" => ShellCommand::Clear,
        "suggest" => ShellCommand::Suggest(rest.to_string()),
        "plan" => ShellCommand::Plan(required(rest, "plan <topic>")?),
        "accept" => {
            let picks = rest
                .split_whitespace()
                .map(|n| n.parse::<usize>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| anyhow::anyhow!("Usage: accept [n ...]"))?;
            ShellCommand::Accept(picks)
        }
        "stats" => ShellCommand::Stats,
        "status" => ShellCommand::Status,
        "dismiss" => ShellCommand::Dismiss,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => bail!("Unknown command: '{}'. Type 'help' for a list.", other),
    };
    Ok(Some(command))
}

fn required(rest: &str, usage: &str) -> Result<String> {
    if rest.is_empty() {
        bail!("Usage: {}", usage);
    }
    Ok(rest.to_string())
}

/// Pick suggestions by 1-based number; no numbers means all
fn pick(items: &[String], picks: &[usize]) -> Result<Vec<String>> {
    if picks.is_empty() {
        return Ok(items.to_vec());
    }
    picks
        .iter()
        .map(|&n| {
            n.checked_sub(1)
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("No suggestion numbered {}", n))
        })
        .collect()
}

struct Shell<'a> {
    todos: &'a TodoService,
    suggester: Suggester,
    /// Last suggestions shown, waiting to be accepted
    pending: Vec<String>,
    subscription: Option<Subscription>,
    status: Option<watch::Receiver<ConnectionStatus>>,
    output: &'a Output,
}

/// Run the interactive shell
pub async fn run(todos: &TodoService, config: &Config, output: &Output) -> Result<()> {
    let subscription = match todos.subscribe().await {
        Ok(sub) => Some(sub),
        Err(e) => {
            output.warn(&format!("Live updates unavailable: {}", e));
            None
        }
    };

    let loaded = match &subscription {
        Some(sub) => todos.load_when_live(sub, JOIN_WAIT).await,
        None => todos.load().await,
    };
    if let Err(e) = loaded {
        output.warn(&store_failure(e).to_string());
    }

    let mut shell = Shell {
        todos,
        suggester: Suggester::new(config.suggest_delay(), config.plan_delay()),
        pending: Vec::new(),
        status: subscription.as_ref().map(Subscription::subscribe_status),
        subscription,
        output,
    };

    output.message("Type 'help' for commands.");
    shell.run_loop().await?;

    if let Some(subscription) = shell.subscription.take() {
        subscription.unsubscribe();
    }
    Ok(())
}

impl Shell<'_> {
    async fn run_loop(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        prompt();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        // EOF
                        break;
                    };
                    match parse_line(&line) {
                        Ok(Some(ShellCommand::Quit)) => break,
                        Ok(Some(command)) => {
                            if let Err(e) = self.execute(command).await {
                                self.output.warn(&format!("{:#}", e));
                            }
                        }
                        Ok(None) => {}
                        Err(e) => self.output.warn(&e.to_string()),
                    }
                    prompt();
                }

                change = next_change(&mut self.subscription) => match change {
                    Some(change) => self.todos.apply_change(change),
                    None => {
                        debug!("Change feed ended");
                        self.subscription = None;
                        self.status = None;
                    }
                },

                current = next_status(&mut self.status) => match current {
                    Some(ConnectionStatus::Connected) => {
                        if let Err(e) = self.todos.rejoined().await {
                            self.output.warn(&store_failure(e).to_string());
                        }
                    }
                    Some(_) => {}
                    None => self.status = None,
                },
            }
        }
        Ok(())
    }

    async fn execute(&mut self, command: ShellCommand) -> Result<()> {
        let todos = self.todos;
        let output = self.output;

        match command {
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::List => {
                todos.state().with(|state| output.print_tasks(&state.tasks));
            }
            ShellCommand::Add(text) => {
                if let Some(task) = todos.add_task(&text, false).await.map_err(store_failure)? {
                    output.success(&format!("Added: {}", task.text));
                }
            }
            ShellCommand::Toggle(id) => {
                let id = todos.state().with(|state| resolve_id(state, &id))?;
                if let Some(task) = todos.toggle_task(&id).await.map_err(store_failure)? {
                    let verb = if task.completed { "Completed" } else { "Reopened" };
                    output.success(&format!("{}: {}", verb, task.text));
                }
            }
            ShellCommand::Edit(id, text) => {
                let id = todos.state().with(|state| resolve_id(state, &id))?;
                if let Some(task) = todos.edit_task(&id, &text).await.map_err(store_failure)? {
                    output.success(&format!("Updated: {}", task.text));
                }
            }
            ShellCommand::Delete(id) => {
                let id = todos.state().with(|state| resolve_id(state, &id))?;
                todos.delete_task(&id).await.map_err(store_failure)?;
                output.success(&format!("Deleted task: {}", id));
            }
            ShellCommand::Clear => {
                todos.clear_completed().await.map_err(store_failure)?;
                output.success("Cleared completed tasks");
            }
            ShellCommand::Suggest(text) => {
                self.pending = self.suggester.suggestions(&text).await;
                self.show_pending();
            }
            ShellCommand::Plan(topic) => {
                self.pending = self.suggester.plan(&topic).await;
                self.show_pending();
            }
            ShellCommand::Accept(picks) => {
                if self.pending.is_empty() {
                    bail!("Nothing to accept. Run 'suggest' or 'plan' first.");
                }
                let chosen = pick(&self.pending, &picks)?;
                accept(todos, &chosen, output).await?;
                self.pending.clear();
            }
            ShellCommand::Stats => {
                let stats = todos.state().with(|state| state.stats());
                output.print_stats(&stats);
            }
            ShellCommand::Status => {
                match &self.subscription {
                    Some(sub) => output.print_connection(sub.status()),
                    None => output.print_connection(ConnectionStatus::Disconnected),
                }
                match todos.snapshot().error {
                    Some(error) => output.message(&format!("Last error: {}", error)),
                    None => output.message("No errors."),
                }
            }
            ShellCommand::Dismiss => todos.dismiss_error(),
            ShellCommand::Quit => {}
        }
        Ok(())
    }

    fn show_pending(&self) {
        if let Some(error) = self.suggester.status().error {
            self.output.warn(&error);
        }
        self.output.print_suggestions(&self.pending);
        if !self.pending.is_empty() {
            self.output.message("Use 'accept' to add them.");
        }
    }
}

/// Next pushed change, or never if there is no feed
async fn next_change(subscription: &mut Option<Subscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

/// Next connection status, `None` once the feed is gone, or never if
/// there is no feed
async fn next_status(
    status: &mut Option<watch::Receiver<ConnectionStatus>>,
) -> Option<ConnectionStatus> {
    match status {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

fn prompt() {
    print!("tend> ");
    if let Err(e) = std::io::stdout().flush() {
        warn!("Failed to flush prompt: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("  ls ").unwrap(), Some(ShellCommand::List));
        assert_eq!(parse_line("q").unwrap(), Some(ShellCommand::Quit));
        assert_eq!(
            parse_line("add  buy milk ").unwrap(),
            Some(ShellCommand::Add("buy milk".to_string()))
        );
    }

    #[test]
    fn test_parse_edit() {
        assert_eq!(
            parse_line("edit 42 buy oat milk").unwrap(),
            Some(ShellCommand::Edit("42".to_string(), "buy oat milk".to_string()))
        );
        assert!(parse_line("edit 42").is_err());
    }

    #[test]
    fn test_parse_accept() {
        assert_eq!(parse_line("accept").unwrap(), Some(ShellCommand::Accept(vec![])));
        assert_eq!(
            parse_line("accept 1 3").unwrap(),
            Some(ShellCommand::Accept(vec![1, 3]))
        );
        assert!(parse_line("accept one").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("toggle").is_err());
        assert!(parse_line("frobnicate").is_err());
    }

    #[tokio::test]
    async fn test_next_status_reports_rejoin() {
        let (tx, rx) = watch::channel(ConnectionStatus::Connected);
        let mut status = Some(rx);

        tx.send(ConnectionStatus::Disconnected).unwrap();
        tx.send(ConnectionStatus::Connected).unwrap();
        assert_eq!(
            next_status(&mut status).await,
            Some(ConnectionStatus::Connected)
        );

        drop(tx);
        assert_eq!(next_status(&mut status).await, None);
    }

    #[test]
    fn test_pick() {
        let items: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(pick(&items, &[]).unwrap(), items);
        assert_eq!(pick(&items, &[3, 1]).unwrap(), vec!["c", "a"]);
        assert!(pick(&items, &[0]).is_err());
        assert!(pick(&items, &[4]).is_err());
    }
}
