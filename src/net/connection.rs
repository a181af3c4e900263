//! Outbound connection accounting.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Enforce total and per-host connection caps via semaphores
//! - Track in-flight connections in `NetworkMetrics` via RAII permits

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{NetworkError, NetworkResult};
use crate::observability::NetworkMetrics;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an outbound connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Caps concurrent outbound connections, in total and per host.
///
/// Callers wait for a slot instead of being rejected.
#[derive(Debug)]
pub struct ConnectionLimiter {
    total: Arc<Semaphore>,
    per_host: DashMap<String, Arc<Semaphore>>,
    max_connections: usize,
    max_per_host: usize,
    metrics: Arc<NetworkMetrics>,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize, max_per_host: usize, metrics: Arc<NetworkMetrics>) -> Self {
        Self {
            total: Arc::new(Semaphore::new(max_connections)),
            per_host: DashMap::new(),
            max_connections,
            max_per_host,
            metrics,
        }
    }

    /// Wait for a connection slot to `host`.
    ///
    /// The per-host slot is taken first so a saturated host never holds
    /// total capacity while it waits.
    pub async fn acquire(&self, host: &str) -> NetworkResult<ConnectionPermit> {
        let host_limit = self
            .per_host
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)))
            .clone();

        let host_permit = host_limit
            .acquire_owned()
            .await
            .map_err(|_| NetworkError::PoolNotInitialized)?;
        let total_permit = self
            .total
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| NetworkError::PoolNotInitialized)?;

        let id = ConnectionId::new();
        self.metrics.connection_opened();
        tracing::trace!(
            connection_id = %id,
            host = %host,
            available = self.total.available_permits(),
            "Connection slot acquired"
        );

        Ok(ConnectionPermit {
            id,
            metrics: Arc::clone(&self.metrics),
            _host: host_permit,
            _total: total_permit,
        })
    }

    /// Wake every waiter with an error and refuse new acquisitions.
    pub fn close(&self) {
        self.total.close();
        for entry in self.per_host.iter() {
            entry.value().close();
        }
    }

    /// Slots currently in use across all hosts.
    pub fn in_use(&self) -> usize {
        self.max_connections - self.total.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn max_per_host(&self) -> usize {
        self.max_per_host
    }
}

/// A held connection slot. Releases both caps and the metric on drop.
#[derive(Debug)]
pub struct ConnectionPermit {
    id: ConnectionId,
    metrics: Arc<NetworkMetrics>,
    _host: OwnedSemaphorePermit,
    _total: OwnedSemaphorePermit,
}

impl ConnectionPermit {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.metrics.connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection slot released");
    }
}
