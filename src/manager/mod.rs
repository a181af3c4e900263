//! Network communication manager.
//!
//! # Responsibilities
//! - Own the pool, DNS resolver, breakers, metrics, status and registry
//! - Initialize and tear down the pool and background tasks
//! - Execute outbound requests with metrics and partition detection
//!
//! # Data Flow
//! ```text
//! make_request(method, url, options)
//!     → pool present? (else PoolNotInitialized)
//!     → DNS pre-resolution through the cache (failure tolerated)
//!     → connection slot (total + per-host caps)
//!     → reqwest send, timed
//!     → success: metrics, clear Partitioned
//!     → failure: metrics, classify → partition detection → recovery task
//! ```

pub mod request;
pub mod status;

use std::error::Error as StdError;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Method;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::config::loader::ConfigError;
use crate::config::validation::validate_config;
use crate::config::{NetworkConfig, SslMode};
use crate::dns::{DnsResolver, FallbackResolver};
use crate::error::{NetworkError, NetworkResult, PartitionReason};
use crate::health::{
    record_partition, HttpProbe, NetworkMonitor, NetworkStatus, PartitionRecovery, Probe, RecoveryOutcome, StatusCell,
};
use crate::lifecycle::Shutdown;
use crate::net::pool::build_client;
use crate::net::{build_tls_context, ConnectionPool, PooledClient, TlsSummary};
use crate::observability::{MetricsSnapshot, NetworkMetrics};
use crate::resilience::CircuitBreaker;
use crate::websocket::{WebSocketHandle, WebSocketId, WebSocketRegistry};

pub use request::RequestOptions;
pub use status::{BreakerReport, ConfigSummary, NetworkStatusReport};

/// Builder for [`NetworkManager`]; lets callers swap the resolver chain and
/// the connectivity probe.
pub struct NetworkManagerBuilder {
    config: NetworkConfig,
    resolver: Option<FallbackResolver>,
    probe: Option<Arc<dyn Probe>>,
}

impl NetworkManagerBuilder {
    pub fn resolver(mut self, resolver: FallbackResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Validate the configuration and assemble the manager.
    pub fn build(self) -> NetworkResult<NetworkManager> {
        validate_config(&self.config).map_err(|errors| NetworkError::Config(ConfigError::Validation(errors)))?;

        let config = Arc::new(self.config);
        let metrics = Arc::new(NetworkMetrics::new());
        let resolver = self
            .resolver
            .unwrap_or_else(|| FallbackResolver::from_config(&config.dns));
        let dns = Arc::new(DnsResolver::new(&config.dns, resolver, Arc::clone(&metrics)));
        let pool = Arc::new(ConnectionPool::new());
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(HttpProbe::new(Arc::clone(&pool))));

        let shared = Shared {
            tls_breaker: CircuitBreaker::new(
                "tls",
                config.connection.tls_circuit_failure_threshold,
                Duration::from_secs(config.connection.tls_circuit_recovery_secs),
            ),
            websockets: Arc::new(WebSocketRegistry::new(config.websocket.max_connections, Arc::clone(&metrics))),
            status: Arc::new(StatusCell::default()),
            shutdown: Shutdown::new(),
            recovery: Mutex::new(None),
            tls_summary: Mutex::new(None),
            config,
            metrics,
            dns,
            pool,
            probe,
        };

        Ok(NetworkManager {
            shared: Arc::new(shared),
            initialized: AtomicBool::new(false),
            monitor: Mutex::new(None),
        })
    }
}

/// State shared with background tasks.
struct Shared {
    config: Arc<NetworkConfig>,
    metrics: Arc<NetworkMetrics>,
    status: Arc<StatusCell>,
    dns: Arc<DnsResolver>,
    pool: Arc<ConnectionPool>,
    websockets: Arc<WebSocketRegistry>,
    tls_breaker: CircuitBreaker,
    probe: Arc<dyn Probe>,
    shutdown: Shutdown,
    recovery: Mutex<Option<JoinHandle<RecoveryOutcome>>>,
    tls_summary: Mutex<Option<TlsSummary>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Handle a partition signal: count it and start recovery once per episode.
    fn on_partition(self: &Arc<Self>, reason: PartitionReason) {
        if !record_partition(&self.status, &self.metrics, reason) {
            return;
        }
        if self.shutdown.is_triggered() {
            return;
        }

        let recovery = PartitionRecovery::new(
            Arc::clone(&self.probe),
            &self.config.monitor,
            self.config.recovery.clone(),
            Arc::clone(&self.status),
        );
        let handle = tokio::spawn(recovery.run(self.shutdown.subscribe()));

        if let Some(previous) = lock(&self.recovery).replace(handle) {
            previous.abort();
        }
    }
}

/// Outbound network communication manager.
pub struct NetworkManager {
    shared: Arc<Shared>,
    initialized: AtomicBool,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkManager {
    /// Manager with the default resolver chain and HTTP probe.
    pub fn new(config: NetworkConfig) -> NetworkResult<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: NetworkConfig) -> NetworkManagerBuilder {
        NetworkManagerBuilder {
            config,
            resolver: None,
            probe: None,
        }
    }

    /// Build the TLS context and pool, then start the background monitor.
    /// Calling it again while initialized does nothing.
    pub async fn initialize(&self) -> NetworkResult<()> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Network manager already initialized");
            return Ok(());
        }

        if let Err(e) = self.install_pool() {
            self.initialized.store(false, Ordering::Release);
            return Err(e);
        }

        let shared = &self.shared;
        shared.shutdown.reset();

        if shared.config.monitor.enabled {
            let monitor = NetworkMonitor::new(
                shared.config.monitor.clone(),
                Arc::clone(&shared.probe),
                Arc::clone(&shared.status),
                Arc::clone(&shared.dns),
                Arc::clone(&shared.websockets),
            );
            let handle = tokio::spawn(monitor.run(shared.shutdown.subscribe()));
            *lock(&self.monitor) = Some(handle);
        } else {
            tracing::info!("Network monitor disabled");
        }

        tracing::info!(
            environment = ?shared.config.environment,
            max_connections = shared.config.connection.max_connections,
            max_per_host = shared.config.connection.max_connections_per_host,
            ssl_mode = ?shared.config.connection.ssl_mode,
            "Network manager initialized"
        );
        Ok(())
    }

    fn install_pool(&self) -> NetworkResult<()> {
        let shared = &self.shared;
        let connection = &shared.config.connection;

        let tls = build_tls_context(connection, &shared.tls_breaker, &shared.metrics)?;
        let (client, tls) = match build_client(connection, Arc::clone(&shared.dns), tls.as_ref()) {
            Ok(client) => (client, tls),
            Err(e) if tls.is_some() && connection.ssl_mode != SslMode::Required => {
                shared.metrics.record_ssl_handshake_failure();
                tracing::warn!(error = %e, "Client build with TLS context failed, retrying with defaults");
                (build_client(connection, Arc::clone(&shared.dns), None)?, None)
            }
            Err(e) => return Err(e),
        };

        *lock(&shared.tls_summary) = tls.as_ref().map(|ctx| ctx.summary());
        shared
            .pool
            .install(PooledClient::new(client, connection, Arc::clone(&shared.metrics)));
        Ok(())
    }

    /// Stop background tasks, close registered WebSockets and the pool.
    /// Safe to call more than once.
    pub async fn cleanup(&self) {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            tracing::debug!("Network manager not initialized, nothing to clean up");
            return;
        }

        let shared = &self.shared;
        shared.shutdown.trigger();

        let monitor = lock(&self.monitor).take();
        if let Some(handle) = monitor {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Network monitor task failed");
            }
        }

        let recovery = lock(&shared.recovery).take();
        if let Some(handle) = recovery {
            match handle.await {
                Ok(outcome) => tracing::debug!(?outcome, "Partition recovery stopped"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::error!(error = %e, "Partition recovery task failed"),
            }
        }

        let closed = shared.websockets.close_all().await;
        shared.pool.close();

        tracing::info!(websockets_closed = closed, "Network manager cleaned up");
    }

    /// Send an HTTP request through the pool.
    ///
    /// HTTP error statuses are returned as responses; only transport
    /// failures are errors.
    pub async fn make_request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> NetworkResult<reqwest::Response> {
        let shared = &self.shared;
        let pool = shared.pool.get()?;

        let parsed = Url::parse(url).map_err(|e| NetworkError::InvalidRequest(format!("{}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| NetworkError::InvalidRequest(format!("{}: missing host", url)))?
            .to_string();

        if let Err(e) = shared.dns.resolve(&host, true).await {
            tracing::debug!(host = %host, error = %e, "DNS pre-resolution failed, continuing");
        }

        let slot_key = match parsed.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.clone(),
        };
        let permit = pool.acquire(&slot_key).await?;

        let builder = options.apply(pool.client().request(method.clone(), parsed));
        let start = Instant::now();
        let result = builder.send().await;
        let elapsed = start.elapsed();
        drop(permit);

        match result {
            Ok(response) => {
                shared.metrics.record_success(elapsed);
                if shared.status.clear_partition() {
                    tracing::info!(url = %url, "Request succeeded, leaving partitioned state");
                }
                tracing::debug!(
                    method = %method,
                    url = %url,
                    status = %response.status(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request completed"
                );
                Ok(response)
            }
            Err(e) => {
                shared.metrics.record_failure();
                if is_tls_failure(&e) {
                    shared.metrics.record_ssl_handshake_failure();
                }

                let partition = PartitionReason::classify(&e);
                tracing::warn!(
                    method = %method,
                    url = %url,
                    error = %e,
                    partition = ?partition,
                    "Request failed"
                );
                if let Some(reason) = partition {
                    shared.on_partition(reason);
                }

                Err(NetworkError::RequestFailed {
                    method: method.to_string(),
                    url: url.to_string(),
                    partition,
                    source: e,
                })
            }
        }
    }

    /// Resolve `hostname` through the cache and fallback chain.
    pub async fn resolve_dns(&self, hostname: &str, use_cache: bool) -> NetworkResult<Vec<std::net::IpAddr>> {
        self.shared.dns.resolve(hostname, use_cache).await
    }

    pub fn register_websocket_connection<H>(&self, handle: &Arc<H>) -> WebSocketId
    where
        H: WebSocketHandle + 'static,
    {
        self.shared.websockets.register(handle)
    }

    pub fn unregister_websocket_connection(&self, id: WebSocketId) -> bool {
        self.shared.websockets.unregister(id)
    }

    pub fn get_network_status(&self) -> NetworkStatusReport {
        let shared = &self.shared;
        NetworkStatusReport {
            status: shared.status.get(),
            initialized: shared.pool.is_initialized(),
            metrics: shared.metrics.snapshot(),
            config: ConfigSummary::from(shared.config.as_ref()),
            circuit_breakers: BreakerReport {
                dns: shared.dns.breaker().snapshot(),
                tls: shared.tls_breaker.snapshot(),
            },
            dns_cache_entries: shared.dns.cache().len(),
            websocket_registrations: shared.websockets.len(),
            tls: lock(&shared.tls_summary).clone(),
        }
    }

    pub fn status(&self) -> NetworkStatus {
        self.shared.status.get()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.shared.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Wait for the current partition recovery task, if any.
    pub async fn wait_for_recovery(&self) -> Option<RecoveryOutcome> {
        let handle = lock(&self.shared.recovery).take()?;
        handle.await.ok()
    }
}

impl std::fmt::Debug for NetworkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkManager")
            .field("initialized", &self.is_initialized())
            .field("status", &self.status())
            .finish()
    }
}

/// True if the error chain carries a rustls error (handshake, certificate,
/// alert). rustls errors reach us wrapped in `io::Error`.
fn is_tls_failure(error: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if err.is::<rustls::Error>() {
            return true;
        }
        if let Some(inner) = err.downcast_ref::<io::Error>().and_then(|io_err| io_err.get_ref()) {
            if inner.is::<rustls::Error>() {
                return true;
            }
        }
        current = err.source();
    }
    false
}
