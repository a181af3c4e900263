//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the network
//! manager. All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the network manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NetworkConfig {
    /// Deployment environment (drives CORS defaults).
    pub environment: Environment,

    /// Outbound connection pool and TLS settings.
    pub connection: ConnectionConfig,

    /// DNS resolution and caching.
    pub dns: DnsConfig,

    /// WebSocket registry limits.
    pub websocket: WebSocketConfig,

    /// CORS allow-list handed to the enclosing service.
    pub cors: CorsConfig,

    /// Background status monitor.
    pub monitor: MonitorConfig,

    /// Partition recovery process.
    pub recovery: RecoveryConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl NetworkConfig {
    /// Defaults for a given environment; only CORS differs between environments.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            cors: CorsConfig::for_environment(environment),
            ..Self::default()
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

/// How strictly TLS setup failures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// No TLS context is built; the client uses library defaults.
    Disabled,
    /// TLS context is built, failures degrade to library defaults.
    #[default]
    Optional,
    /// TLS context failures are fatal.
    Required,
}

/// Outbound connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Idle read timeout in seconds.
    pub read_timeout_secs: u64,

    /// Write timeout in seconds. The HTTP client has no separate write
    /// deadline, so request writes are bounded by `total_timeout_secs`.
    /// Validated but not otherwise applied.
    pub write_timeout_secs: u64,

    /// Overall request deadline in seconds.
    pub total_timeout_secs: u64,

    /// Maximum concurrent connections across all hosts.
    pub max_connections: usize,

    /// Maximum concurrent connections to a single host.
    pub max_connections_per_host: usize,

    pub ssl_mode: SslMode,

    /// Verify server certificates and hostnames.
    pub verify_ssl: bool,

    /// Extra CA bundle (PEM) added to the trust store.
    pub ca_bundle_path: Option<String>,

    /// Client certificate chain (PEM) for mutual TLS.
    pub client_cert_path: Option<String>,

    /// Client private key (PEM) for mutual TLS.
    pub client_key_path: Option<String>,

    /// Negotiate gzip/deflate response compression.
    pub enable_compression: bool,

    /// How long idle pooled connections are kept before cleanup.
    pub keepalive_timeout_secs: u64,

    pub user_agent: String,

    /// Consecutive TLS setup failures before the TLS breaker opens.
    pub tls_circuit_failure_threshold: u32,

    /// Seconds the TLS breaker stays open before a trial.
    pub tls_circuit_recovery_secs: u64,
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            read_timeout_secs: 60,
            write_timeout_secs: 30,
            total_timeout_secs: 120,
            max_connections: 100,
            max_connections_per_host: 30,
            ssl_mode: SslMode::Optional,
            verify_ssl: true,
            ca_bundle_path: None,
            client_cert_path: None,
            client_key_path: None,
            enable_compression: true,
            keepalive_timeout_secs: 30,
            user_agent: concat!("network-manager/", env!("CARGO_PKG_VERSION")).to_string(),
            tls_circuit_failure_threshold: 3,
            tls_circuit_recovery_secs: 30,
        }
    }
}

/// DNS resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Nameservers queried in order before the system resolver.
    pub nameservers: Vec<String>,

    /// Per-nameserver query timeout in seconds.
    pub timeout_secs: u64,

    /// Cache entry lifetime in seconds.
    pub cache_ttl_secs: u64,

    /// Maximum number of cached hostnames.
    pub max_cache_size: usize,

    /// Seconds a failed resolution is remembered; repeat lookups inside this
    /// window fail without querying again. 0 disables it.
    pub negative_cache_ttl_secs: u64,

    /// Consecutive resolution failures before the DNS breaker opens.
    pub circuit_failure_threshold: u32,

    /// Seconds the DNS breaker stays open before a trial.
    pub circuit_recovery_secs: u64,
}

impl DnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn negative_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_cache_ttl_secs)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            nameservers: vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],
            timeout_secs: 5,
            cache_ttl_secs: 300,
            max_cache_size: 1000,
            negative_cache_ttl_secs: 5,
            circuit_failure_threshold: 5,
            circuit_recovery_secs: 60,
        }
    }
}

/// WebSocket registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Registrations beyond this count are flagged (not refused).
    pub max_connections: usize,

    /// Heartbeat interval advertised to WebSocket owners, in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            heartbeat_interval_secs: 30,
        }
    }
}

/// CORS allow-list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl CorsConfig {
    /// Wildcard in development. Staging and production start empty; validation
    /// rejects that until the deployment lists its origins.
    pub fn for_environment(environment: Environment) -> Self {
        let allow_origins = match environment {
            Environment::Development => vec!["*".to_string()],
            Environment::Staging | Environment::Production => Vec::new(),
        };
        Self {
            allow_origins,
            allow_credentials: environment != Environment::Development,
            max_age_secs: 600,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Development)
    }
}

/// Background monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Run the background monitor task.
    pub enabled: bool,

    /// Seconds between monitor cycles.
    pub interval_secs: u64,

    /// Timeout for each health-check probe in seconds.
    pub probe_timeout_secs: u64,

    /// External endpoints probed each cycle.
    pub health_check_urls: Vec<String>,
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            probe_timeout_secs: 10,
            health_check_urls: vec![
                "https://www.google.com".to_string(),
                "https://www.cloudflare.com".to_string(),
                "https://1.1.1.1".to_string(),
            ],
        }
    }
}

/// Partition recovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Attempts before recovery is abandoned.
    pub max_attempts: u32,

    /// Base delay in seconds; attempt `n` waits `base * 2^min(n, max_exponent)`.
    pub base_delay_secs: u64,

    pub max_exponent: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_secs: 5,
            max_exponent: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "json" for machine-readable logs, anything else for human-readable.
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}
