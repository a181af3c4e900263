//! Connectivity probing against external health-check endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Serialize;

use crate::health::state::{status_from_success_rate, NetworkStatus};
use crate::net::ConnectionPool;

/// A single reachability check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// True if `url` answered successfully within `timeout`.
    async fn check(&self, url: &str, timeout: Duration) -> bool;
}

/// Probes over the manager's connection pool.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    pool: Arc<ConnectionPool>,
}

impl HttpProbe {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, url: &str, timeout: Duration) -> bool {
        let pool = match self.pool.get() {
            Ok(pool) => pool,
            Err(_) => {
                tracing::debug!(url = %url, "Probe skipped: pool not initialized");
                return false;
            }
        };

        match pool.client().get(url).timeout(timeout).send().await {
            Ok(response) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(url = %url, status = %response.status(), "Probe failed: non-success status");
                }
                success
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, timeout = e.is_timeout(), "Probe failed");
                false
            }
        }
    }
}

/// Outcome of probing every health-check endpoint once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeReport {
    pub successes: usize,
    pub total: usize,
    pub success_rate: f64,
    pub status: NetworkStatus,
}

/// Probe all `urls` concurrently. `None` when there is nothing to probe.
pub async fn probe_status(probe: &dyn Probe, urls: &[String], timeout: Duration) -> Option<ProbeReport> {
    if urls.is_empty() {
        return None;
    }

    let results = join_all(urls.iter().map(|url| probe.check(url, timeout))).await;
    let successes = results.iter().filter(|ok| **ok).count();
    let total = urls.len();
    let success_rate = successes as f64 / total as f64;

    Some(ProbeReport {
        successes,
        total,
        success_rate,
        status: status_from_success_rate(success_rate),
    })
}
