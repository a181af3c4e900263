//! Serializable network status report.

use serde::Serialize;

use crate::config::{Environment, NetworkConfig, SslMode};
use crate::health::NetworkStatus;
use crate::net::TlsSummary;
use crate::observability::MetricsSnapshot;
use crate::resilience::CircuitSnapshot;

/// Everything `get_network_status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatusReport {
    pub status: NetworkStatus,
    pub initialized: bool,
    pub metrics: MetricsSnapshot,
    pub config: ConfigSummary,
    pub circuit_breakers: BreakerReport,
    pub dns_cache_entries: usize,
    pub websocket_registrations: usize,
    pub tls: Option<TlsSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerReport {
    pub dns: CircuitSnapshot,
    pub tls: CircuitSnapshot,
}

/// Effective configuration, without file paths or key material.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub environment: Environment,
    pub max_connections: usize,
    pub max_connections_per_host: usize,
    pub connect_timeout_secs: u64,
    pub total_timeout_secs: u64,
    pub ssl_mode: SslMode,
    pub verify_ssl: bool,
    pub nameservers: Vec<String>,
    pub dns_cache_ttl_secs: u64,
    pub dns_max_cache_size: usize,
    pub websocket_max_connections: usize,
    pub websocket_heartbeat_interval_secs: u64,
    pub monitor_interval_secs: u64,
    pub health_check_urls: Vec<String>,
    pub cors_allow_origins: Vec<String>,
}

impl From<&NetworkConfig> for ConfigSummary {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            environment: config.environment,
            max_connections: config.connection.max_connections,
            max_connections_per_host: config.connection.max_connections_per_host,
            connect_timeout_secs: config.connection.connect_timeout_secs,
            total_timeout_secs: config.connection.total_timeout_secs,
            ssl_mode: config.connection.ssl_mode,
            verify_ssl: config.connection.verify_ssl,
            nameservers: config.dns.nameservers.clone(),
            dns_cache_ttl_secs: config.dns.cache_ttl_secs,
            dns_max_cache_size: config.dns.max_cache_size,
            websocket_max_connections: config.websocket.max_connections,
            websocket_heartbeat_interval_secs: config.websocket.heartbeat_interval_secs,
            monitor_interval_secs: config.monitor.interval_secs,
            health_check_urls: config.monitor.health_check_urls.clone(),
            cors_allow_origins: config.cors.allow_origins.clone(),
        }
    }
}
