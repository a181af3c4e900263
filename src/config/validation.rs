//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check nameservers and health-check URLs parse
//! - Reject insecure combinations (required TLS without verification)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NetworkConfig → Result<(), Vec<ValidationError>>
//! - Runs once, before the config is handed to the manager

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::{Environment, NetworkConfig, SslMode};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("connection.max_connections_per_host ({per_host}) exceeds connection.max_connections ({total})")]
    PerHostAboveTotal { per_host: usize, total: usize },

    #[error("dns.nameservers entry '{0}' is not an IP address")]
    InvalidNameserver(String),

    #[error("monitor.health_check_urls entry '{0}' is not a valid URL")]
    InvalidHealthCheckUrl(String),

    #[error("connection.client_cert_path and connection.client_key_path must be set together")]
    IncompleteClientIdentity,

    #[error("connection.verify_ssl = false is not allowed with ssl_mode = required")]
    RequiredTlsWithoutVerification,

    #[error("cors.allow_origins must not contain '*' in production")]
    WildcardOriginInProduction,

    #[error("cors.allow_origins must be an explicit list outside development")]
    EmptyOriginList,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &NetworkConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let conn = &config.connection;
    let positive = [
        ("connection.connect_timeout_secs", conn.connect_timeout_secs),
        ("connection.read_timeout_secs", conn.read_timeout_secs),
        ("connection.write_timeout_secs", conn.write_timeout_secs),
        ("connection.total_timeout_secs", conn.total_timeout_secs),
        ("connection.max_connections", conn.max_connections as u64),
        ("connection.max_connections_per_host", conn.max_connections_per_host as u64),
        ("dns.timeout_secs", config.dns.timeout_secs),
        ("dns.cache_ttl_secs", config.dns.cache_ttl_secs),
        ("dns.max_cache_size", config.dns.max_cache_size as u64),
        ("monitor.interval_secs", config.monitor.interval_secs),
        ("monitor.probe_timeout_secs", config.monitor.probe_timeout_secs),
        ("recovery.max_attempts", u64::from(config.recovery.max_attempts)),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if conn.max_connections_per_host > conn.max_connections {
        errors.push(ValidationError::PerHostAboveTotal {
            per_host: conn.max_connections_per_host,
            total: conn.max_connections,
        });
    }

    if conn.client_cert_path.is_some() != conn.client_key_path.is_some() {
        errors.push(ValidationError::IncompleteClientIdentity);
    }

    if conn.ssl_mode == SslMode::Required && !conn.verify_ssl {
        errors.push(ValidationError::RequiredTlsWithoutVerification);
    }

    for ns in &config.dns.nameservers {
        if ns.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidNameserver(ns.clone()));
        }
    }

    for url in &config.monitor.health_check_urls {
        if url::Url::parse(url).is_err() {
            errors.push(ValidationError::InvalidHealthCheckUrl(url.clone()));
        }
    }

    let origins = &config.cors.allow_origins;
    match config.environment {
        Environment::Development => {}
        Environment::Production if origins.iter().any(|o| o == "*") => {
            errors.push(ValidationError::WildcardOriginInProduction);
        }
        _ if origins.is_empty() => errors.push(ValidationError::EmptyOriginList),
        _ => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
