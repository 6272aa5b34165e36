//! Change feed handle
//!
//! A [`Subscription`] is the receiving end of a store's push channel. It is
//! a `Stream` of [`ChangeEvent`]s; calling [`Subscription::unsubscribe`] or
//! dropping it tells the producer to stop and release the connection.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::{mpsc, oneshot, watch};

use super::ChangeEvent;

/// Push channel connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected, or between reconnect attempts
    Disconnected,
    /// Attempting to connect and join
    Connecting,
    /// Joined and receiving changes
    Connected,
}

/// Producer side, held by the task feeding a subscription
pub(crate) struct SubscriptionParts {
    pub events_tx: mpsc::Sender<ChangeEvent>,
    pub status_tx: watch::Sender<ConnectionStatus>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Live feed of changes from the store
pub struct Subscription {
    events_rx: mpsc::Receiver<ChangeEvent>,
    status_rx: watch::Receiver<ConnectionStatus>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// Create a subscription and the producer half that feeds it
    pub(crate) fn pair(capacity: usize) -> (Self, SubscriptionParts) {
        let (events_tx, events_rx) = mpsc::channel(capacity);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let subscription = Self {
            events_rx,
            status_rx,
            shutdown_tx: Some(shutdown_tx),
        };
        let parts = SubscriptionParts {
            events_tx,
            status_tx,
            shutdown_rx,
        };
        (subscription, parts)
    }

    /// Wait for the next change; `None` once the feed has ended
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events_rx.recv().await
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch connection status changes
    ///
    /// The returned receiver has already seen the current status.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        let mut rx = self.status_rx.clone();
        rx.borrow_and_update();
        rx
    }

    /// Wait until the feed has joined
    ///
    /// Returns `false` if the feed ends or `timeout` passes first.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut status = self.status_rx.clone();
        let joined = async move {
            status
                .wait_for(|s| *s == ConnectionStatus::Connected)
                .await
                .is_ok()
        };
        tokio::time::timeout(timeout, joined).await.unwrap_or(false)
    }

    /// Stop the feed and release the connection
    pub fn unsubscribe(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events_rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskId;

    #[tokio::test]
    async fn test_events_flow_through() {
        let (mut sub, parts) = Subscription::pair(4);

        parts
            .events_tx
            .send(ChangeEvent::Delete(TaskId::from("1")))
            .await
            .unwrap();
        drop(parts);

        assert_eq!(sub.next().await, Some(ChangeEvent::Delete(TaskId::from("1"))));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_unsubscribe_signals_producer() {
        let (sub, parts) = Subscription::pair(4);
        assert_eq!(sub.status(), ConnectionStatus::Disconnected);

        sub.unsubscribe();
        assert!(parts.shutdown_rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_signals_producer() {
        let (sub, parts) = Subscription::pair(4);
        drop(sub);
        assert!(parts.shutdown_rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_connected() {
        let (sub, parts) = Subscription::pair(4);
        assert!(!sub.wait_connected(Duration::from_millis(20)).await);

        let status_tx = parts.status_tx;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = status_tx.send(ConnectionStatus::Connecting);
            let _ = status_tx.send(ConnectionStatus::Connected);
        });
        assert!(sub.wait_connected(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_wait_connected_ends_with_feed() {
        let (sub, parts) = Subscription::pair(4);
        drop(parts);
        assert!(!sub.wait_connected(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_status_updates() {
        let (sub, parts) = Subscription::pair(4);
        let mut rx = sub.subscribe_status();

        parts.status_tx.send(ConnectionStatus::Connected).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionStatus::Connected);
        assert_eq!(sub.status(), ConnectionStatus::Connected);
    }
}
