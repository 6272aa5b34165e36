//! Realtime subscription task
//!
//! Maintains a long-lived WebSocket connection to the change feed.
//! Handles reconnection automatically with exponential backoff and stops
//! when the subscription is dropped or unsubscribed.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::message::{Frame, ServerEvent};
use crate::config::{ConfigError, StoreSettings};
use crate::store::{ChangeEvent, ConnectionStatus, Subscription, SubscriptionParts};

type WsRead = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Buffered changes per subscription
const EVENT_BUFFER: usize = 64;

/// Configuration for the realtime connection
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket URL
    pub url: String,
    /// Access token sent when joining
    pub access_token: String,
    /// Database schema of the table
    pub schema: String,
    /// Table to watch
    pub table: String,
    /// Interval between heartbeats
    pub heartbeat_interval: Duration,
    /// How long to wait for the join reply
    pub join_timeout: Duration,
    /// Initial reconnect delay
    pub initial_reconnect_delay: Duration,
    /// Maximum reconnect delay
    pub max_reconnect_delay: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            access_token: String::new(),
            schema: "public".to_string(),
            table: "todos".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            join_timeout: Duration::from_secs(10),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl RealtimeConfig {
    /// Build from store settings
    pub fn from_settings(settings: &StoreSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            url: settings.realtime_endpoint()?.to_string(),
            access_token: settings.key.clone(),
            table: settings.table.clone(),
            ..Default::default()
        })
    }

    /// Channel topic for the watched table
    pub fn topic(&self) -> String {
        format!("realtime:{}:{}", self.schema, self.table)
    }
}

/// How a connection ended
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    /// Subscriber went away; stop for good
    Shutdown,
    /// Server closed the connection; reconnect
    Closed,
}

/// Message reference counter
struct Refs(u64);

impl Refs {
    fn next(&mut self) -> String {
        self.0 += 1;
        self.0.to_string()
    }
}

/// Spawn a realtime subscription
///
/// Returns immediately; the connection is made in the background and its
/// progress is visible through [`Subscription::status`].
pub fn subscribe(config: RealtimeConfig) -> Subscription {
    let (subscription, parts) = Subscription::pair(EVENT_BUFFER);
    tokio::spawn(subscription_loop(config, parts));
    subscription
}

/// Main loop with reconnection
async fn subscription_loop(config: RealtimeConfig, parts: SubscriptionParts) {
    let SubscriptionParts {
        events_tx,
        status_tx,
        mut shutdown_rx,
    } = parts;
    let mut reconnect_delay = config.initial_reconnect_delay;
    let mut refs = Refs(0);

    info!("Subscribing to {}", config.topic());

    loop {
        let _ = status_tx.send(ConnectionStatus::Connecting);

        match connect_and_listen(&config, &mut refs, &events_tx, &status_tx, &mut shutdown_rx)
            .await
        {
            Ok(Exit::Shutdown) => break,
            Ok(Exit::Closed) => {
                info!("Realtime connection closed by server");
                // Connection closed normally, reset backoff
                reconnect_delay = config.initial_reconnect_delay;
            }
            Err(e) => {
                warn!("Realtime connection error: {:#}", e);
            }
        }

        let _ = status_tx.send(ConnectionStatus::Disconnected);

        if events_tx.is_closed() {
            break;
        }

        // Wait before reconnecting, but stop if unsubscribed
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {
                reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay);
            }
            _ = &mut shutdown_rx => break,
        }
    }

    let _ = status_tx.send(ConnectionStatus::Disconnected);
    info!("Unsubscribed from {}", config.topic());
}

/// Connect, join, and forward changes until disconnection or shutdown
async fn connect_and_listen(
    config: &RealtimeConfig,
    refs: &mut Refs,
    events_tx: &mpsc::Sender<ChangeEvent>,
    status_tx: &watch::Sender<ConnectionStatus>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> Result<Exit> {
    let topic = config.topic();

    debug!("Connecting to realtime endpoint");
    let (ws_stream, _) = connect_async(config.url.as_str())
        .await
        .context("Failed to connect to realtime server")?;
    let (mut write, mut read) = ws_stream.split();

    let join_ref = refs.next();
    let join = Frame::join(
        &topic,
        &config.schema,
        &config.table,
        &config.access_token,
        &join_ref,
    );
    write.send(Message::Text(join.encode()?)).await?;

    wait_for_join(&mut read, &join_ref, config.join_timeout).await?;

    let _ = status_tx.send(ConnectionStatus::Connected);
    info!("Joined {}", topic);

    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    // First tick completes immediately
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = &mut *shutdown_rx => {
                let leave = Frame::leave(&topic, &refs.next());
                if let Ok(text) = leave.encode() {
                    write.send(Message::Text(text)).await.ok();
                }
                write.close().await.ok();
                return Ok(Exit::Shutdown);
            }

            _ = heartbeat.tick() => {
                let frame = Frame::heartbeat(&refs.next());
                write.send(Message::Text(frame.encode()?)).await?;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ServerEvent::decode(&text) {
                        Ok(ServerEvent::Change(event)) => {
                            debug!("Change received for task {}", event.task_id());
                            if events_tx.send(event).await.is_err() {
                                write.close().await.ok();
                                return Ok(Exit::Shutdown);
                            }
                        }
                        Ok(ServerEvent::Reply { ok: false, response, .. }) => {
                            warn!("Realtime server rejected a message: {}", response);
                        }
                        Ok(ServerEvent::ChannelError) => {
                            anyhow::bail!("Realtime channel {} crashed on the server", topic);
                        }
                        Ok(ServerEvent::ChannelClosed) => return Ok(Exit::Closed),
                        Ok(_) => {}
                        Err(e) => {
                            debug!("Ignoring undecodable realtime frame: {}", e);
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok(Exit::Closed),
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
        }
    }
}

/// Wait for the reply to our join frame
async fn wait_for_join(read: &mut WsRead, join_ref: &str, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            anyhow::bail!("Timeout waiting for realtime join. Check the store URL and key.");
        }

        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = ServerEvent::decode(&text);
                        if let Ok(ServerEvent::Reply { msg_ref, ok, response }) = reply {
                            if msg_ref.as_deref() != Some(join_ref) {
                                continue;
                            }
                            if ok {
                                return Ok(());
                            }
                            anyhow::bail!("Realtime join rejected: {}", response);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        anyhow::bail!("Realtime server closed connection during join");
                    }
                    Some(Err(e)) => {
                        anyhow::bail!("Realtime connection error: {}", e);
                    }
                    _ => {}
                }
            }
            _ = tokio::time::sleep(remaining) => {
                anyhow::bail!("Timeout waiting for realtime join. Check the store URL and key.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RealtimeConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.initial_reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
        assert_eq!(config.topic(), "realtime:public:todos");
    }

    #[test]
    fn test_from_settings() {
        let settings = StoreSettings {
            url: "https://demo.example.co".to_string(),
            key: "anon".to_string(),
            table: "tasks".to_string(),
        };
        let config = RealtimeConfig::from_settings(&settings).unwrap();
        assert!(config.url.starts_with("wss://demo.example.co/realtime/v1/websocket"));
        assert_eq!(config.access_token, "anon");
        assert_eq!(config.topic(), "realtime:public:tasks");
    }

    #[test]
    fn test_refs_increment() {
        let mut refs = Refs(0);
        assert_eq!(refs.next(), "1");
        assert_eq!(refs.next(), "2");
    }

    #[tokio::test]
    async fn test_unsubscribe_while_reconnecting() {
        let config = RealtimeConfig {
            // Nothing listens here; every attempt fails fast
            url: "ws://127.0.0.1:9/realtime/v1/websocket".to_string(),
            initial_reconnect_delay: Duration::from_secs(60),
            ..Default::default()
        };

        let sub = subscribe(config);
        let mut status = sub.subscribe_status();

        sub.unsubscribe();

        // The task drops its status sender once it exits, without waiting
        // out the 60s backoff
        let finished = tokio::time::timeout(Duration::from_secs(5), async {
            while status.changed().await.is_ok() {}
        })
        .await;
        assert!(finished.is_ok());
        assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
    }
}
