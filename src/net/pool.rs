//! Shared outbound HTTP connection pool.
//!
//! # Responsibilities
//! - Build the one `reqwest::Client` the manager uses (timeouts, compression,
//!   idle cleanup, TLS context)
//! - Route the connector's DNS through the manager's TTL cache
//! - Gate dispatch on total and per-host connection caps
//! - Swap the pool in on Initialize() and out on Cleanup()

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use crate::config::ConnectionConfig;
use crate::dns::DnsResolver;
use crate::error::{NetworkError, NetworkResult};
use crate::net::connection::{ConnectionLimiter, ConnectionPermit};
use crate::net::tls::TlsContext;
use crate::observability::NetworkMetrics;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connector DNS adapter: resolves through the manager's cache.
#[derive(Debug)]
struct CachedDnsResolve {
    resolver: Arc<DnsResolver>,
}

impl Resolve for CachedDnsResolve {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            let ips = resolver
                .resolve(name.as_str(), true)
                .await
                .map_err(|e| Box::new(e) as BoxError)?;
            // Port 0 is replaced by the connector with the URL's port.
            let addrs: Addrs = Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok::<Addrs, BoxError>(addrs)
        })
    }
}

/// Build the pool's HTTP client.
pub fn build_client(
    config: &ConnectionConfig,
    resolver: Arc<DnsResolver>,
    tls: Option<&TlsContext>,
) -> NetworkResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .connect_timeout(config.connect_timeout())
        .read_timeout(config.read_timeout())
        .timeout(config.total_timeout())
        .pool_max_idle_per_host(config.max_connections_per_host)
        .pool_idle_timeout(config.keepalive_timeout())
        .tcp_keepalive(config.keepalive_timeout())
        .gzip(config.enable_compression)
        .deflate(config.enable_compression)
        .user_agent(config.user_agent.as_str())
        .dns_resolver(Arc::new(CachedDnsResolve { resolver }));

    if let Some(tls) = tls {
        builder = tls.apply(builder);
    }

    builder
        .build()
        .map_err(|e| NetworkError::TlsInitFailed(format!("HTTP client construction failed: {}", e)))
}

/// A live pool: the client plus its connection caps.
#[derive(Debug)]
pub struct PooledClient {
    client: reqwest::Client,
    limiter: ConnectionLimiter,
}

impl PooledClient {
    pub fn new(client: reqwest::Client, config: &ConnectionConfig, metrics: Arc<NetworkMetrics>) -> Self {
        Self {
            client,
            limiter: ConnectionLimiter::new(config.max_connections, config.max_connections_per_host, metrics),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Wait for a connection slot to `host`.
    pub async fn acquire(&self, host: &str) -> NetworkResult<ConnectionPermit> {
        self.limiter.acquire(host).await
    }

    pub fn limiter(&self) -> &ConnectionLimiter {
        &self.limiter
    }
}

/// Holder for the manager's single pool. Empty before Initialize() and
/// after Cleanup().
#[derive(Debug, Default)]
pub struct ConnectionPool {
    current: ArcSwapOption<PooledClient>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly built pool, replacing any previous one.
    pub fn install(&self, pool: PooledClient) {
        if let Some(previous) = self.current.swap(Some(Arc::new(pool))) {
            previous.limiter.close();
        }
    }

    /// The live pool, or `PoolNotInitialized`.
    pub fn get(&self) -> NetworkResult<Arc<PooledClient>> {
        self.current.load_full().ok_or(NetworkError::PoolNotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.current.load().is_some()
    }

    /// Tear the pool down. Requests already holding the client finish;
    /// waiters for a slot are released with an error.
    pub fn close(&self) -> bool {
        match self.current.swap(None) {
            Some(pool) => {
                pool.limiter.close();
                tracing::info!("Connection pool closed");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DnsConfig;
    use crate::dns::FallbackResolver;

    fn resolver(metrics: Arc<NetworkMetrics>) -> Arc<DnsResolver> {
        let config = DnsConfig::default();
        Arc::new(DnsResolver::new(&config, FallbackResolver::from_config(&config), metrics))
    }

    #[tokio::test]
    async fn test_pool_lifecycle() {
        let metrics = Arc::new(NetworkMetrics::new());
        let config = ConnectionConfig::default();
        let pool = ConnectionPool::new();

        assert!(matches!(pool.get(), Err(NetworkError::PoolNotInitialized)));

        let client = build_client(&config, resolver(metrics.clone()), None).unwrap();
        pool.install(PooledClient::new(client, &config, metrics));
        assert!(pool.is_initialized());

        let live = pool.get().unwrap();
        assert_eq!(live.limiter().max_connections(), 100);
        assert_eq!(live.limiter().max_per_host(), 30);

        assert!(pool.close());
        assert!(!pool.is_initialized());
        assert!(!pool.close());
        assert!(live.acquire("example.com").await.is_err());
    }
}
