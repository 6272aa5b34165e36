//! Command handlers

pub mod config;
pub mod shell;
pub mod stats;
pub mod suggest;
pub mod task;
pub mod watch;
