//! Tend CLI
//!
//! Command-line interface for Tend - a synchronized todo list.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tend_core::{Config, MemoryStore, MissingConfigPolicy, RemoteStore, RestStore, TodoService};

mod commands;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "tend")]
#[command(about = "Tend - a todo list that stays in sync")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use a specific config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all tasks
    #[command(alias = "ls")]
    List,
    /// Add a task
    Add {
        /// Task text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Mark the task as coming from a suggestion
        #[arg(long)]
        ai: bool,
    },
    /// Mark a task done, or not done
    Toggle {
        /// Task ID (full or prefix)
        id: String,
    },
    /// Replace a task's text
    Edit {
        /// Task ID (full or prefix)
        id: String,
        /// New text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Delete a task
    #[command(alias = "rm")]
    Delete {
        /// Task ID (full or prefix)
        id: String,
    },
    /// Delete all completed tasks
    Clear {
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Suggest tasks related to some text
    Suggest {
        /// What you are working on
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,
        /// Add every suggestion to the list
        #[arg(long)]
        add: bool,
    },
    /// Generate a checklist for a topic
    Plan {
        /// Topic to plan for
        #[arg(required = true, num_args = 1..)]
        topic: Vec<String>,
        /// Add the whole checklist to the list
        #[arg(long)]
        add: bool,
    },
    /// Show progress statistics
    Stats,
    /// Print changes as they happen
    Watch,
    /// Interactive session with live updates
    Shell {
        /// Use a throwaway in-memory list instead of the remote store
        #[arg(long)]
        memory: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (store_url, store_key, table, realtime_enabled, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work even when the store is not set up
    let command = match cli.command {
        Commands::Config { command } => {
            return handle_config_command(command, config_path, &output);
        }
        other => other,
    };

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    match command {
        Commands::List => {
            let todos = open_todos(&config, &output)?;
            commands::task::list(&todos, &output).await
        }
        Commands::Add { text, ai } => {
            let todos = open_todos(&config, &output)?;
            commands::task::add(&todos, &text.join(" "), ai, &output).await
        }
        Commands::Toggle { id } => {
            let todos = open_todos(&config, &output)?;
            commands::task::toggle(&todos, &id, &output).await
        }
        Commands::Edit { id, text } => {
            let todos = open_todos(&config, &output)?;
            commands::task::edit(&todos, &id, &text.join(" "), &output).await
        }
        Commands::Delete { id } => {
            let todos = open_todos(&config, &output)?;
            commands::task::delete(&todos, &id, &output).await
        }
        Commands::Clear { yes } => {
            let todos = open_todos(&config, &output)?;
            commands::task::clear(&todos, yes, &output).await
        }
        Commands::Suggest { input, add } => {
            commands::suggest::suggest(&config, &input.join(" "), add, &output).await
        }
        Commands::Plan { topic, add } => {
            commands::suggest::plan(&config, &topic.join(" "), add, &output).await
        }
        Commands::Stats => {
            let todos = open_todos(&config, &output)?;
            commands::stats::show(&todos, &output).await
        }
        Commands::Watch => {
            let todos = open_todos(&config, &output)?;
            commands::watch::watch(&todos, &output).await
        }
        Commands::Shell { memory } => {
            let todos = if memory {
                TodoService::new(Arc::new(MemoryStore::new()))
            } else {
                open_todos(&config, &output)?
            };
            commands::shell::run(&todos, &config, &output).await
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Connect the todo service to the configured store
///
/// Missing settings stop debug builds; release builds warn and continue
/// with a store that rejects every request.
pub(crate) fn open_todos(config: &Config, output: &Output) -> Result<TodoService> {
    let settings = config
        .check_store(MissingConfigPolicy::for_build())
        .context(
            "Store is not configured. Set it with:\n  \
             tend config set store_url https://your-project.example.co\n  \
             tend config set store_key YOUR_KEY",
        )?;

    let store = RestStore::from_settings(settings)?.with_realtime(config.realtime_enabled);
    if !store.is_configured() {
        output.warn("Store is not configured; every request will fail. See `tend config show`.");
    }

    let store: Arc<dyn RemoteStore> = Arc::new(store);
    Ok(TodoService::new(store))
}

/// Set up logging when TEND_LOG is set
///
/// Logs go to `log_file` if configured, otherwise stderr.
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("TEND_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!("tend_core={},tend={}", log_level, log_level));

    match config.log_file {
        Some(ref log_path) => {
            let log_file = match File::create(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
                    return;
                }
            };

            // Ignore error if already initialized
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file)
                .try_init();

            info!("Logging initialized to {:?}", log_path);
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_joins_words() {
        let cli = Cli::try_parse_from(["tend", "add", "buy", "milk", "--ai"]).unwrap();
        match cli.command {
            Commands::Add { text, ai } => {
                assert_eq!(text.join(" "), "buy milk");
                assert!(ai);
            }
            _ => panic!("Expected add"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tend", "list", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_shell_memory_flag() {
        let cli = Cli::try_parse_from(["tend", "shell", "--memory"]).unwrap();
        assert!(matches!(cli.command, Commands::Shell { memory: true }));
    }
}
