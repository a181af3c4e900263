//! Registry of WebSocket handles owned elsewhere in the service.
//!
//! Handles are held weakly and keyed by identity: registering the same
//! handle twice yields the same id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::observability::NetworkMetrics;

#[derive(Debug, Error)]
pub enum WebSocketError {
    #[error("WebSocket close failed: {0}")]
    Close(String),
}

/// A WebSocket owned elsewhere, as seen by the registry.
#[async_trait]
pub trait WebSocketHandle: Send + Sync {
    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), WebSocketError>;
}

static WEBSOCKET_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Registration key returned by [`WebSocketRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WebSocketId(u64);

impl WebSocketId {
    fn next() -> Self {
        Self(WEBSOCKET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for WebSocketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

pub struct WebSocketRegistry {
    handles: DashMap<WebSocketId, Weak<dyn WebSocketHandle>>,
    max_connections: usize,
    metrics: Arc<NetworkMetrics>,
}

impl WebSocketRegistry {
    pub fn new(max_connections: usize, metrics: Arc<NetworkMetrics>) -> Self {
        Self {
            handles: DashMap::new(),
            max_connections,
            metrics,
        }
    }

    /// Register `handle`. A handle already registered keeps its id.
    pub fn register<H>(&self, handle: &Arc<H>) -> WebSocketId
    where
        H: WebSocketHandle + 'static,
    {
        let target = Arc::as_ptr(handle) as *const ();
        if let Some(existing) = self
            .handles
            .iter()
            .find(|entry| entry.value().as_ptr() as *const () == target)
        {
            let id = *existing.key();
            tracing::debug!(websocket_id = %id, "WebSocket already registered");
            return id;
        }

        let id = WebSocketId::next();
        let weak: Weak<H> = Arc::downgrade(handle);
        self.handles.insert(id, weak);

        let count = self.handles.len();
        if count > self.max_connections {
            tracing::warn!(
                websocket_id = %id,
                count,
                max = self.max_connections,
                "WebSocket registrations above configured maximum"
            );
        }
        self.metrics.set_websocket_connections(count);
        tracing::debug!(websocket_id = %id, count, "WebSocket registered");
        id
    }

    /// Remove a registration. Unknown ids are ignored.
    pub fn unregister(&self, id: WebSocketId) -> bool {
        let removed = self.handles.remove(&id).is_some();
        if removed {
            self.metrics.set_websocket_connections(self.handles.len());
            tracing::debug!(websocket_id = %id, "WebSocket unregistered");
        }
        removed
    }

    /// Drop closed or unreachable handles; returns the live count.
    pub fn sweep(&self) -> usize {
        self.handles
            .retain(|_, weak| weak.upgrade().is_some_and(|handle| !handle.is_closed()));

        let active = self.handles.len();
        self.metrics.set_websocket_connections(active);
        active
    }

    /// Close and forget every registered handle. Failures are logged and
    /// skipped. Returns how many closed cleanly.
    pub async fn close_all(&self) -> usize {
        let ids: Vec<WebSocketId> = self.handles.iter().map(|entry| *entry.key()).collect();
        let mut closed = 0;

        for id in ids {
            let Some((_, weak)) = self.handles.remove(&id) else {
                continue;
            };
            let Some(handle) = weak.upgrade() else {
                continue;
            };
            if handle.is_closed() {
                continue;
            }
            match handle.close().await {
                Ok(()) => closed += 1,
                Err(e) => tracing::warn!(websocket_id = %id, error = %e, "Failed to close WebSocket"),
            }
        }

        self.metrics.set_websocket_connections(self.handles.len());
        closed
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

impl std::fmt::Debug for WebSocketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketRegistry")
            .field("registered", &self.handles.len())
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct FakeSocket {
        closed: AtomicBool,
        fail_close: bool,
    }

    #[async_trait]
    impl WebSocketHandle for FakeSocket {
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        async fn close(&self) -> Result<(), WebSocketError> {
            if self.fail_close {
                return Err(WebSocketError::Close("peer gone".to_string()));
            }
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn registry() -> (WebSocketRegistry, Arc<NetworkMetrics>) {
        let metrics = Arc::new(NetworkMetrics::new());
        (WebSocketRegistry::new(1000, metrics.clone()), metrics)
    }

    #[test]
    fn test_sweep_drops_closed_handles() {
        let (registry, metrics) = registry();
        let sockets: Vec<Arc<FakeSocket>> = (0..5).map(|_| Arc::new(FakeSocket::default())).collect();
        for socket in &sockets {
            registry.register(socket);
        }
        sockets[1].closed.store(true, Ordering::SeqCst);
        sockets[3].closed.store(true, Ordering::SeqCst);

        assert_eq!(registry.sweep(), 3);
        assert_eq!(metrics.snapshot().websocket_connections, 3);
    }

    #[test]
    fn test_sweep_drops_released_handles() {
        let (registry, _) = registry();
        let kept = Arc::new(FakeSocket::default());
        let dropped = Arc::new(FakeSocket::default());
        registry.register(&kept);
        registry.register(&dropped);
        drop(dropped);

        assert_eq!(registry.sweep(), 1);
    }

    #[test]
    fn test_register_same_handle_once() {
        let (registry, metrics) = registry();
        let socket = Arc::new(FakeSocket::default());
        let other = Arc::new(FakeSocket::default());

        let first = registry.register(&socket);
        let again = registry.register(&socket);
        let distinct = registry.register(&other);

        assert_eq!(first, again);
        assert_ne!(first, distinct);
        assert_eq!(registry.len(), 2);
        assert_eq!(metrics.snapshot().websocket_connections, 2);
    }

    #[test]
    fn test_unregister_is_unconditional() {
        let (registry, _) = registry();
        let socket = Arc::new(FakeSocket::default());
        let id = registry.register(&socket);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_over_cap_is_accepted() {
        let registry = WebSocketRegistry::new(1, Arc::new(NetworkMetrics::new()));
        let a = Arc::new(FakeSocket::default());
        let b = Arc::new(FakeSocket::default());
        registry.register(&a);
        registry.register(&b);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_close_all_is_best_effort() {
        let (registry, _) = registry();
        let good = Arc::new(FakeSocket::default());
        let bad = Arc::new(FakeSocket {
            fail_close: true,
            ..FakeSocket::default()
        });
        registry.register(&good);
        registry.register(&bad);

        assert_eq!(registry.close_all().await, 1);
        assert!(good.is_closed());
        assert!(registry.is_empty());
    }
}
