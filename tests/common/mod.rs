//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use network_manager::dns::{Lookup, LookupError};
use network_manager::health::Probe;
use std::net::IpAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a mock backend on an ephemeral port that answers every request
/// with `200 OK` and `body`.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on: bind, read the port, release it.
pub async fn closed_port_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Probe with a fixed answer that counts its calls.
#[derive(Default)]
pub struct FixedProbe {
    pub up: bool,
    pub calls: AtomicU32,
}

impl FixedProbe {
    pub fn down() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[allow(dead_code)]
    pub fn up() -> Arc<Self> {
        Arc::new(Self {
            up: true,
            calls: AtomicU32::new(0),
        })
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for FixedProbe {
    async fn check(&self, _url: &str, _timeout: Duration) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.up
    }
}

/// Resolver that always fails and counts its calls.
#[derive(Debug, Default)]
pub struct FailingLookup {
    pub calls: AtomicU32,
}

impl FailingLookup {
    #[allow(dead_code)]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Lookup for FailingLookup {
    fn label(&self) -> String {
        "failing".to_string()
    }

    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LookupError::NoRecords {
            resolver: self.label(),
            hostname: hostname.to_string(),
        })
    }
}
