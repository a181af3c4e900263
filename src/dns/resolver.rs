//! Hostname resolution with nameserver fallback, caching, and a breaker.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::DnsConfig;
use crate::dns::cache::DnsCache;
use crate::error::{NetworkError, NetworkResult};
use crate::observability::NetworkMetrics;
use crate::resilience::{CircuitBreaker, CircuitError};

/// Failure of a single resolver, or of the whole fallback chain.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("{resolver}: no addresses for {hostname}")]
    NoRecords { resolver: String, hostname: String },

    #[error("{resolver}: timed out after {after:?}")]
    Timeout { resolver: String, after: Duration },

    #[error("{resolver}: {message}")]
    Failed { resolver: String, message: String },

    #[error("all {attempted} resolvers failed, last error: {last}")]
    Exhausted { attempted: usize, last: Box<LookupError> },
}

/// One way of turning a hostname into addresses.
#[async_trait]
pub trait Lookup: Send + Sync + fmt::Debug {
    /// Label used in logs and errors.
    fn label(&self) -> String;

    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupError>;
}

/// Queries a single nameserver directly.
pub struct NameserverLookup {
    nameserver: IpAddr,
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl NameserverLookup {
    pub fn new(nameserver: IpAddr, query_timeout: Duration) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(&[nameserver], 53, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), group);

        let mut opts = ResolverOpts::default();
        opts.timeout = query_timeout;
        opts.attempts = 1;
        // Caching is ours; the resolver must always ask.
        opts.cache_size = 0;

        Self {
            nameserver,
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout: query_timeout,
        }
    }
}

impl fmt::Debug for NameserverLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameserverLookup")
            .field("nameserver", &self.nameserver)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Lookup for NameserverLookup {
    fn label(&self) -> String {
        format!("nameserver {}", self.nameserver)
    }

    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupError> {
        // hickory enforces its own per-query timeout; this bounds the whole lookup.
        let answer = timeout(self.timeout, self.resolver.lookup_ip(hostname))
            .await
            .map_err(|_| LookupError::Timeout {
                resolver: self.label(),
                after: self.timeout,
            })?
            .map_err(|e| LookupError::Failed {
                resolver: self.label(),
                message: e.to_string(),
            })?;

        non_empty(self.label(), hostname, answer.iter().collect())
    }
}

/// The operating system's resolver (getaddrinfo).
#[derive(Debug, Clone)]
pub struct SystemLookup {
    timeout: Duration,
}

impl SystemLookup {
    pub fn new(lookup_timeout: Duration) -> Self {
        Self {
            timeout: lookup_timeout,
        }
    }
}

#[async_trait]
impl Lookup for SystemLookup {
    fn label(&self) -> String {
        "system resolver".to_string()
    }

    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupError> {
        let addrs = timeout(self.timeout, tokio::net::lookup_host((hostname, 0)))
            .await
            .map_err(|_| LookupError::Timeout {
                resolver: self.label(),
                after: self.timeout,
            })?
            .map_err(|e| LookupError::Failed {
                resolver: self.label(),
                message: e.to_string(),
            })?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs.map(|a: SocketAddr| a.ip()) {
            if !ips.contains(&addr) {
                ips.push(addr);
            }
        }
        non_empty(self.label(), hostname, ips)
    }
}

fn non_empty(resolver: String, hostname: &str, ips: Vec<IpAddr>) -> Result<Vec<IpAddr>, LookupError> {
    if ips.is_empty() {
        Err(LookupError::NoRecords {
            resolver,
            hostname: hostname.to_string(),
        })
    } else {
        Ok(ips)
    }
}

/// Tries each configured nameserver in order, then the system resolver.
#[derive(Debug, Clone)]
pub struct FallbackResolver {
    nameservers: Vec<Arc<dyn Lookup>>,
    system: Arc<dyn Lookup>,
}

impl FallbackResolver {
    pub fn new(nameservers: Vec<Arc<dyn Lookup>>, system: Arc<dyn Lookup>) -> Self {
        Self { nameservers, system }
    }

    /// Build from config. Unparseable nameserver entries are skipped.
    pub fn from_config(config: &DnsConfig) -> Self {
        let nameservers = config
            .nameservers
            .iter()
            .filter_map(|ns| match ns.parse::<IpAddr>() {
                Ok(ip) => Some(Arc::new(NameserverLookup::new(ip, config.timeout())) as Arc<dyn Lookup>),
                Err(_) => {
                    tracing::warn!(nameserver = %ns, "Ignoring invalid nameserver address");
                    None
                }
            })
            .collect();

        Self::new(nameservers, Arc::new(SystemLookup::new(config.timeout())))
    }

    /// First resolver to answer wins.
    pub async fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>, LookupError> {
        let mut last = None;
        let chain = self.nameservers.iter().chain(std::iter::once(&self.system));

        for (attempt, resolver) in chain.enumerate() {
            match resolver.lookup(hostname).await {
                Ok(ips) => {
                    if attempt > 0 {
                        tracing::debug!(
                            hostname = %hostname,
                            resolver = %resolver.label(),
                            attempt = attempt + 1,
                            "Resolved via fallback"
                        );
                    }
                    return Ok(ips);
                }
                Err(e) => {
                    tracing::debug!(hostname = %hostname, error = %e, "Resolver failed, trying next");
                    last = Some(e);
                }
            }
        }

        let attempted = self.nameservers.len() + 1;
        Err(LookupError::Exhausted {
            attempted,
            last: Box::new(last.unwrap_or_else(|| LookupError::NoRecords {
                resolver: "none".to_string(),
                hostname: hostname.to_string(),
            })),
        })
    }
}

/// Cached, breaker-guarded resolution used by the manager and the pool.
#[derive(Debug)]
pub struct DnsResolver {
    cache: DnsCache,
    fallback: FallbackResolver,
    breaker: CircuitBreaker,
    metrics: Arc<NetworkMetrics>,
}

impl DnsResolver {
    pub fn new(config: &DnsConfig, fallback: FallbackResolver, metrics: Arc<NetworkMetrics>) -> Self {
        Self {
            cache: DnsCache::new(config.cache_ttl(), config.max_cache_size)
                .with_negative_ttl(config.negative_cache_ttl()),
            fallback,
            breaker: CircuitBreaker::new(
                "dns",
                config.circuit_failure_threshold,
                Duration::from_secs(config.circuit_recovery_secs),
            ),
            metrics,
        }
    }

    /// Resolve `hostname` to its addresses.
    ///
    /// IP literals are returned as-is. A fresh cache entry is served when
    /// `use_cache` is set, and a failure recorded within the negative TTL is
    /// repeated without querying again. On resolver failure any cached entry
    /// is served as a degraded fallback.
    pub async fn resolve(&self, hostname: &str, use_cache: bool) -> NetworkResult<Vec<IpAddr>> {
        let host = hostname.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        let key = host.trim_end_matches('.').to_ascii_lowercase();
        if key.is_empty() {
            return Err(NetworkError::DnsResolutionFailed {
                hostname: hostname.to_string(),
                reason: "empty hostname".to_string(),
            });
        }

        if use_cache {
            if let Some(ips) = self.cache.get_fresh(&key) {
                self.metrics.record_dns_cache_hit();
                tracing::trace!(hostname = %key, "DNS cache hit");
                return Ok(ips);
            }
            if let Some(reason) = self.cache.recent_failure(&key) {
                tracing::trace!(hostname = %key, "DNS negative cache hit");
                return self.stale_or_error(key, reason);
            }
        }

        match self.breaker.call(|| self.fallback.resolve(&key)).await {
            Ok(ips) => {
                if let Some(evicted) = self.cache.insert(&key, ips.clone()) {
                    tracing::debug!(evicted = %evicted, "DNS cache full, evicted oldest entry");
                }
                tracing::debug!(hostname = %key, addresses = ips.len(), "DNS resolved");
                Ok(ips)
            }
            Err(e) => {
                let reason = match e {
                    CircuitError::Open(name) => format!("circuit '{}' is open", name),
                    CircuitError::Inner(inner) => inner.to_string(),
                };
                self.cache.insert_failure(&key, &reason);
                self.stale_or_error(key, reason)
            }
        }
    }

    fn stale_or_error(&self, key: String, reason: String) -> NetworkResult<Vec<IpAddr>> {
        if let Some(stale) = self.cache.get_stale(&key) {
            tracing::warn!(
                hostname = %key,
                age_secs = stale.age().as_secs(),
                error = %reason,
                "DNS resolution failed, serving cached addresses"
            );
            return Ok(stale.ips);
        }

        tracing::warn!(hostname = %key, error = %reason, "DNS resolution failed");
        Err(NetworkError::DnsResolutionFailed {
            hostname: key,
            reason,
        })
    }

    /// Drop cache entries older than twice the TTL.
    pub fn purge_expired(&self) -> usize {
        let purged = self.cache.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, remaining = self.cache.len(), "Purged expired DNS entries");
        }
        purged
    }

    pub fn cache(&self) -> &DnsCache {
        &self.cache
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}
