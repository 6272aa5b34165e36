//! Realtime change feed
//!
//! Provides WebSocket-based change notifications from the hosted store.
//!
//! ## Protocol
//!
//! 1. Connect to `{url}/realtime/v1/websocket?apikey=...`
//! 2. Join `realtime:{schema}:{table}` asking for all row changes
//! 3. Send a heartbeat every 30 seconds
//! 4. Forward `postgres_changes` frames as [`ChangeEvent`]s
//!
//! ## Usage
//!
//! ```ignore
//! let mut sub = realtime::subscribe(RealtimeConfig::from_settings(&settings));
//! while let Some(change) = sub.next().await {
//!     state.dispatch(change.into());
//! }
//! ```
//!
//! [`ChangeEvent`]: crate::store::ChangeEvent

mod client;
mod message;

pub use client::{subscribe, RealtimeConfig};
pub use message::{Frame, ServerEvent};
