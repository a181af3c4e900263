//! TLS context construction for the outbound pool.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;

use crate::config::{ConnectionConfig, SslMode};
use crate::error::{NetworkError, NetworkResult};
use crate::observability::NetworkMetrics;
use crate::resilience::CircuitBreaker;

/// TLS settings applied to the pool's client builder.
#[derive(Clone)]
pub struct TlsContext {
    root_certificates: Vec<reqwest::Certificate>,
    identity: Option<reqwest::Identity>,
    accept_invalid_certs: bool,
}

/// What the TLS context contains, without the key material.
#[derive(Debug, Clone, Serialize)]
pub struct TlsSummary {
    pub extra_root_certificates: usize,
    pub client_identity: bool,
    pub verification_disabled: bool,
}

impl TlsContext {
    pub fn apply(&self, mut builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        for cert in &self.root_certificates {
            builder = builder.add_root_certificate(cert.clone());
        }
        if let Some(identity) = &self.identity {
            builder = builder.identity(identity.clone());
        }
        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder
    }

    pub fn summary(&self) -> TlsSummary {
        TlsSummary {
            extra_root_certificates: self.root_certificates.len(),
            client_identity: self.identity.is_some(),
            verification_disabled: self.accept_invalid_certs,
        }
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("root_certificates", &self.root_certificates.len())
            .field("identity", &self.identity.is_some())
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// Build the TLS context for the pool.
///
/// Returns `Ok(None)` when TLS is disabled, or when construction failed in a
/// mode weaker than `required`. In `required` mode any failure is fatal.
pub fn build_tls_context(
    config: &ConnectionConfig,
    breaker: &CircuitBreaker,
    metrics: &NetworkMetrics,
) -> NetworkResult<Option<TlsContext>> {
    if config.ssl_mode == SslMode::Disabled {
        tracing::info!("TLS disabled, using plain client defaults");
        return Ok(None);
    }

    let result = if breaker.try_acquire() {
        let loaded = load_tls_context(config);
        match &loaded {
            Ok(_) => breaker.record_success(),
            Err(_) => breaker.record_failure(),
        }
        loaded
    } else {
        Err(format!("circuit '{}' is open", breaker.name()))
    };

    match result {
        Ok(ctx) => {
            tracing::info!(
                ssl_mode = ?config.ssl_mode,
                extra_roots = ctx.root_certificates.len(),
                mutual_tls = ctx.identity.is_some(),
                "TLS context ready"
            );
            Ok(Some(ctx))
        }
        Err(reason) => {
            metrics.record_ssl_handshake_failure();
            if config.ssl_mode == SslMode::Required {
                tracing::error!(error = %reason, "TLS context failed in required mode");
                Err(NetworkError::TlsInitFailed(reason))
            } else {
                tracing::warn!(error = %reason, "TLS context failed, continuing without custom TLS");
                Ok(None)
            }
        }
    }
}

fn load_tls_context(config: &ConnectionConfig) -> Result<TlsContext, String> {
    if config.ssl_mode == SslMode::Required && !config.verify_ssl {
        return Err("certificate verification cannot be disabled with ssl_mode = required".to_string());
    }

    if !config.verify_ssl {
        tracing::warn!(
            "TLS certificate and hostname verification DISABLED; outbound connections are open to interception"
        );
    }

    let root_certificates = match &config.ca_bundle_path {
        Some(path) => load_ca_bundle(Path::new(path))?,
        None => Vec::new(),
    };

    let identity = match (&config.client_cert_path, &config.client_key_path) {
        (Some(cert), Some(key)) => Some(load_identity(Path::new(cert), Path::new(key))?),
        (None, None) => None,
        _ => return Err("client certificate and key must be configured together".to_string()),
    };

    Ok(TlsContext {
        root_certificates,
        identity,
        accept_invalid_certs: !config.verify_ssl,
    })
}

fn load_ca_bundle(path: &Path) -> Result<Vec<reqwest::Certificate>, String> {
    let file = File::open(path).map_err(|e| format!("CA bundle {}: {}", path.display(), e))?;
    let mut reader = BufReader::new(file);

    let ders = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("CA bundle {}: {}", path.display(), e))?;
    if ders.is_empty() {
        return Err(format!("CA bundle {} contains no certificates", path.display()));
    }

    ders.iter()
        .map(|der| {
            reqwest::Certificate::from_der(der.as_ref())
                .map_err(|e| format!("CA bundle {}: {}", path.display(), e))
        })
        .collect()
}

fn load_identity(cert_path: &Path, key_path: &Path) -> Result<reqwest::Identity, String> {
    let cert_pem = std::fs::read(cert_path)
        .map_err(|e| format!("client certificate {}: {}", cert_path.display(), e))?;
    let key_pem = std::fs::read(key_path)
        .map_err(|e| format!("client key {}: {}", key_path.display(), e))?;

    let has_cert = rustls_pemfile::certs(&mut cert_pem.as_slice()).any(|c| c.is_ok());
    if !has_cert {
        return Err(format!("client certificate {} contains no certificates", cert_path.display()));
    }
    match rustls_pemfile::private_key(&mut key_pem.as_slice()) {
        Ok(Some(_)) => {}
        Ok(None) => return Err(format!("client key {} contains no private key", key_path.display())),
        Err(e) => return Err(format!("client key {}: {}", key_path.display(), e)),
    }

    let mut bundle = cert_pem;
    bundle.push(b'\n');
    bundle.extend_from_slice(&key_pem);
    reqwest::Identity::from_pem(&bundle).map_err(|e| format!("client identity: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;
    use std::time::Duration;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("tls", 3, Duration::from_secs(30))
    }

    #[test]
    fn test_disabled_returns_no_context() {
        let config = ConnectionConfig {
            ssl_mode: SslMode::Disabled,
            ..ConnectionConfig::default()
        };
        let ctx = build_tls_context(&config, &breaker(), &NetworkMetrics::new()).unwrap();
        assert!(ctx.is_none());
    }

    #[test]
    fn test_default_context_uses_trust_store() {
        let ctx = build_tls_context(&ConnectionConfig::default(), &breaker(), &NetworkMetrics::new())
            .unwrap()
            .unwrap();
        let summary = ctx.summary();
        assert_eq!(summary.extra_root_certificates, 0);
        assert!(!summary.client_identity);
        assert!(!summary.verification_disabled);
    }

    #[test]
    fn test_insecure_path_in_optional_mode() {
        let config = ConnectionConfig {
            verify_ssl: false,
            ..ConnectionConfig::default()
        };
        let ctx = build_tls_context(&config, &breaker(), &NetworkMetrics::new())
            .unwrap()
            .unwrap();
        assert!(ctx.summary().verification_disabled);
    }

    #[test]
    fn test_missing_ca_bundle_degrades_in_optional_mode() {
        let config = ConnectionConfig {
            ca_bundle_path: Some("/nonexistent/ca.pem".to_string()),
            ..ConnectionConfig::default()
        };
        let metrics = NetworkMetrics::new();
        let breaker = breaker();
        let ctx = build_tls_context(&config, &breaker, &metrics).unwrap();
        assert!(ctx.is_none());
        assert_eq!(metrics.snapshot().ssl_handshake_failures, 1);
        assert_eq!(breaker.snapshot().consecutive_failures, 1);
    }

    #[test]
    fn test_missing_ca_bundle_fatal_in_required_mode() {
        let config = ConnectionConfig {
            ssl_mode: SslMode::Required,
            ca_bundle_path: Some("/nonexistent/ca.pem".to_string()),
            ..ConnectionConfig::default()
        };
        let err = build_tls_context(&config, &breaker(), &NetworkMetrics::new()).unwrap_err();
        assert!(matches!(err, NetworkError::TlsInitFailed(_)));
    }

    #[test]
    fn test_required_rejects_disabled_verification() {
        let config = ConnectionConfig {
            ssl_mode: SslMode::Required,
            verify_ssl: false,
            ..ConnectionConfig::default()
        };
        let err = build_tls_context(&config, &breaker(), &NetworkMetrics::new()).unwrap_err();
        assert!(err.to_string().contains("verification"));
    }

    #[test]
    fn test_empty_ca_bundle_rejected() {
        let path = std::env::temp_dir().join("network_manager_empty_ca.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();

        let err = load_ca_bundle(&path).unwrap_err();
        assert!(err.contains("no certificates"));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_open_breaker_short_circuits() {
        let breaker = CircuitBreaker::new("tls", 1, Duration::from_secs(300));
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        let ctx = build_tls_context(&ConnectionConfig::default(), &breaker, &NetworkMetrics::new()).unwrap();
        assert!(ctx.is_none());
    }
}
