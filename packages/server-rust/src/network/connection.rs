//! Connection management for the realtime channel.
//!
//! Provides per-connection backpressure via bounded mpsc channels,
//! lock-free concurrent connection tracking via `DashMap`, and
//! metadata storage for subscription state.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, RwLock};

use super::config::ConnectionConfig;

/// Unique identifier for a connection, assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Message to be sent outbound to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// A serialized server message.
    Text(String),
    /// A close frame with an optional reason.
    Close(Option<String>),
}

/// Error returned when sending a message to a connection fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The send operation timed out (channel is full and remained full).
    Timeout,
    /// The connection has been closed; the receiver was dropped.
    Disconnected,
}

/// Handle to a single connection, providing send capabilities and metadata access.
///
/// The receiver end of the bounded channel is held by the connection's
/// writer task; this handle holds the sender end.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub tx: mpsc::Sender<OutboundMessage>,
    pub metadata: Arc<RwLock<ConnectionMetadata>>,
}

impl ConnectionHandle {
    /// Attempts to send a message without blocking.
    ///
    /// Returns `false` if the channel is full or the connection has closed.
    #[must_use]
    pub fn try_send(&self, msg: OutboundMessage) -> bool {
        self.tx.try_send(msg).is_ok()
    }

    /// Sends a message, waiting at most `timeout` for channel capacity.
    ///
    /// # Errors
    ///
    /// Returns `SendError::Timeout` if the channel remains full for the
    /// entire timeout duration. Returns `SendError::Disconnected` if the
    /// writer task has exited.
    pub async fn send_timeout(
        &self,
        msg: OutboundMessage,
        timeout: Duration,
    ) -> Result<(), SendError> {
        match tokio::time::timeout(timeout, self.tx.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SendError::Disconnected),
            Err(_) => Err(SendError::Timeout),
        }
    }
}

/// Mutable metadata associated with a connection.
#[derive(Debug, Default)]
pub struct ConnectionMetadata {
    /// Module names this connection asked to follow.
    pub subscriptions: HashSet<String>,
    /// Realtime calls received over this connection.
    pub calls: u64,
}

/// Thread-safe registry of all open realtime channel connections.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates a new empty registry. Connection IDs start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new connection, returning a handle and the message receiver.
    ///
    /// The receiver should be passed to the connection's writer task, which
    /// forwards outbound messages over the wire.
    pub fn register(
        &self,
        config: &ConnectionConfig,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(config.outbound_channel_capacity);

        let handle = Arc::new(ConnectionHandle {
            id,
            tx,
            metadata: Arc::new(RwLock::new(ConnectionMetadata::default())),
        });

        self.connections.insert(id, Arc::clone(&handle));
        (handle, rx)
    }

    pub fn remove(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(&id).map(|(_, handle)| handle)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Removes and returns all connections. Used during graceful shutdown.
    pub fn drain_all(&self) -> Vec<Arc<ConnectionHandle>> {
        let keys: Vec<ConnectionId> = self
            .connections
            .iter()
            .map(|entry| *entry.key())
            .collect();

        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((_, handle)) = self.connections.remove(&key) {
                handles.push(handle);
            }
        }
        handles
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> OutboundMessage {
        OutboundMessage::Text(s.to_string())
    }

    #[test]
    fn register_assigns_increasing_ids() {
        let registry = ConnectionRegistry::new();
        let config = ConnectionConfig::default();

        let (h1, _rx1) = registry.register(&config);
        let (h2, _rx2) = registry.register(&config);

        assert_eq!(h1.id, ConnectionId(1));
        assert_eq!(h2.id, ConnectionId(2));
        assert_eq!(registry.count(), 2);
        assert_eq!(h2.id.to_string(), "conn-2");
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = registry.register(&ConnectionConfig::default());
        let id = handle.id;

        assert_eq!(registry.remove(id).unwrap().id, id);
        assert!(registry.remove(id).is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn drain_all_empties_registry() {
        let registry = ConnectionRegistry::new();
        let config = ConnectionConfig::default();
        let (_h1, _rx1) = registry.register(&config);
        let (_h2, _rx2) = registry.register(&config);

        assert_eq!(registry.count(), 2);
        let drained = registry.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn try_send_respects_configured_capacity() {
        let config = ConnectionConfig {
            outbound_channel_capacity: 2,
            ..ConnectionConfig::default()
        };
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = registry.register(&config);

        assert!(handle.try_send(text("a")));
        assert!(handle.try_send(text("b")));
        assert!(!handle.try_send(text("c")));

        assert_eq!(rx.try_recv().unwrap(), text("a"));
    }

    #[test]
    fn try_send_after_disconnect_fails() {
        let registry = ConnectionRegistry::new();
        let (handle, rx) = registry.register(&ConnectionConfig::default());
        assert!(handle.try_send(text("early")));

        drop(rx);
        assert!(!handle.try_send(text("late")));
    }

    #[tokio::test]
    async fn send_timeout_reports_disconnect_and_timeout() {
        let config = ConnectionConfig {
            outbound_channel_capacity: 1,
            ..ConnectionConfig::default()
        };
        let registry = ConnectionRegistry::new();
        let (handle, rx) = registry.register(&config);

        handle
            .send_timeout(text("fills"), Duration::from_millis(50))
            .await
            .unwrap();
        let result = handle
            .send_timeout(text("blocked"), Duration::from_millis(20))
            .await;
        assert_eq!(result, Err(SendError::Timeout));

        drop(rx);
        let result = handle
            .send_timeout(text("gone"), Duration::from_millis(20))
            .await;
        assert_eq!(result, Err(SendError::Disconnected));
    }

    #[tokio::test]
    async fn metadata_tracks_subscriptions() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = registry.register(&ConnectionConfig::default());

        handle
            .metadata
            .write()
            .await
            .subscriptions
            .insert("py-ml".to_string());

        let meta = handle.metadata.read().await;
        assert!(meta.subscriptions.contains("py-ml"));
        assert_eq!(meta.calls, 0);
    }
}
