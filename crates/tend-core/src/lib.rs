//! Tend Core Library
//!
//! This crate provides the core of Tend, a todo list kept in a hosted
//! table and synchronized with every other client through a push channel.
//!
//! # Architecture
//!
//! - **Remote store**: source of truth for tasks, reached through the
//!   [`RemoteStore`] trait
//! - **Reducer**: the in-memory list only changes by applying confirmed
//!   records, merged by task ID
//! - **Realtime**: change notifications from other clients feed the same
//!   reducer
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = RestStore::new(config.store_settings()?)?;
//! let todos = TodoService::new(Arc::new(store));
//!
//! let changes = todos.subscribe().await?;
//! todos.load_when_live(&changes, JOIN_WAIT).await?;
//! todos.add_task("buy milk", false).await?;
//!
//! tokio::spawn(async move { todos.follow(changes).await });
//! ```
//!
//! # Modules
//!
//! - `todos`: Mutation operations (main entry point)
//! - `state`: Todo state, actions and the reducer
//! - `models`: Tasks and request payloads
//! - `store`: Remote store trait and implementations
//! - `realtime`: WebSocket change feed
//! - `suggest`: Keyword-based task suggestions
//! - `time`: Relative timestamps
//! - `config`: Application configuration

pub mod config;
pub mod models;
pub mod realtime;
pub mod state;
pub mod store;
pub mod suggest;
pub mod time;
pub mod todos;

pub use config::{Config, ConfigError, MissingConfigPolicy, StoreSettings};
pub use models::{NewTask, Task, TaskId, TaskPatch};
pub use state::{reduce, Action, StateContainer, TaskStats, TodoState};
pub use store::{
    ChangeEvent, ConnectionStatus, MemoryStore, RemoteStore, RestStore, StoreError, StoreResult,
    Subscription,
};
pub use suggest::{generate_list, suggest, Suggester};
pub use todos::{BulkAdd, TodoService, JOIN_WAIT};
