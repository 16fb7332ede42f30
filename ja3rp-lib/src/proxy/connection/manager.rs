use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use crate::telemetry::Metrics;

use super::guards::ConnectionGuard;

/// Errors that can occur when trying to accept a connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Server is shutting down")]
    Shutdown,
    #[error("Connection limit exceeded (current: {current}, limit: {limit})")]
    LimitExceeded { current: usize, limit: usize },
}

/// Manages connection limits and lifecycle
pub struct ConnectionManager {
    active_connections: Arc<AtomicUsize>,
    max_connections: usize,
    shutdown: AtomicBool,
    connections_closed_tx: watch::Sender<()>,
}

impl ConnectionManager {
    pub fn new(max_connections: usize) -> Self {
        let (connections_closed_tx, _) = watch::channel(());
        Self {
            active_connections: Arc::new(AtomicUsize::new(0)),
            max_connections,
            shutdown: AtomicBool::new(false),
            connections_closed_tx,
        }
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting; existing guards stay valid
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Try to accept a new connection
    /// Returns Ok(guard) if connection is accepted, Err(ConnectionError) if rejected
    pub fn try_accept(
        &self,
        peer: std::net::SocketAddr,
        metrics: Option<&Arc<Metrics>>,
    ) -> Result<ConnectionGuard, ConnectionError> {
        if self.is_shutdown() {
            return Err(ConnectionError::Shutdown);
        }

        let current_connections = self.active_connections.load(Ordering::Acquire);
        if current_connections >= self.max_connections {
            if let Some(m) = metrics {
                m.record_connection_rejected();
            }
            warn!(
                current = current_connections,
                limit = self.max_connections,
                peer = %peer,
                "Connection limit exceeded, rejecting connection"
            );
            return Err(ConnectionError::LimitExceeded {
                current: current_connections,
                limit: self.max_connections,
            });
        }

        self.active_connections.fetch_add(1, Ordering::AcqRel);

        if let Some(m) = metrics {
            m.record_connection_opened();
        }

        Ok(ConnectionGuard::new(
            self.active_connections.clone(),
            self.connections_closed_tx.clone(),
            metrics.cloned(),
        ))
    }

    /// Wait until every guard is dropped. Returns false on timeout.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let mut closed = self.connections_closed_tx.subscribe();
        let drained = async {
            while self.active() > 0 {
                if closed.changed().await.is_err() {
                    break;
                }
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}
