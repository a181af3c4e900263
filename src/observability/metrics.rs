//! Metrics collection.
//!
//! # Responsibilities
//! - Hold the manager's `NetworkMetrics` record (never reset while running)
//! - Mirror every update to the `metrics` facade
//!
//! # Metrics
//! - `netmgr_requests_total` (counter): outbound requests by outcome
//! - `netmgr_request_duration_seconds` (histogram): successful request latency
//! - `netmgr_dns_cache_hits_total` (counter)
//! - `netmgr_ssl_handshake_failures_total` (counter)
//! - `netmgr_partition_events_total` (counter)
//! - `netmgr_active_connections` (gauge)
//! - `netmgr_websocket_connections` (gauge)
//! - `netmgr_network_status` (gauge): 0=connected 1=unstable 2=disconnected 3=partitioned

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// Smoothing factor for the response-time moving average.
pub const EMA_ALPHA: f64 = 0.1;

/// Next value of an exponential moving average; the first sample seeds it.
pub fn update_ema(current: Option<f64>, sample: f64) -> f64 {
    match current {
        Some(avg) => (1.0 - EMA_ALPHA) * avg + EMA_ALPHA * sample,
        None => sample,
    }
}

/// Aggregate network metrics, updated incrementally.
#[derive(Debug, Default)]
pub struct NetworkMetrics {
    active_connections: AtomicU64,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    average_response_time_ms: Mutex<Option<f64>>,
    dns_cache_hit_count: AtomicU64,
    ssl_handshake_failures: AtomicU64,
    websocket_connections: AtomicU64,
    network_errors: AtomicU64,
    partition_events: AtomicU64,
}

/// Serializable copy of [`NetworkMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub active_connections: u64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub average_response_time_ms: f64,
    pub dns_cache_hit_count: u64,
    pub ssl_handshake_failures: u64,
    pub websocket_connections: u64,
    pub network_errors: u64,
    pub partition_events: u64,
}

impl NetworkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        let active = self.active_connections.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::gauge!("netmgr_active_connections").set(active as f64);
    }

    pub fn connection_closed(&self) {
        let active = self.active_connections.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        metrics::gauge!("netmgr_active_connections").set(active as f64);
    }

    /// Record a successful request and fold its latency into the average.
    pub fn record_success(&self, elapsed: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.record_response_time(elapsed.as_secs_f64() * 1000.0);

        metrics::counter!("netmgr_requests_total", "outcome" => "success").increment(1);
        metrics::histogram!("netmgr_request_duration_seconds").record(elapsed.as_secs_f64());
    }

    /// Fold one latency sample (milliseconds) into the moving average.
    pub fn record_response_time(&self, sample_ms: f64) -> f64 {
        let mut avg = self
            .average_response_time_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let next = update_ema(*avg, sample_ms);
        *avg = Some(next);
        next
    }

    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.network_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("netmgr_requests_total", "outcome" => "failure").increment(1);
    }

    pub fn record_dns_cache_hit(&self) {
        self.dns_cache_hit_count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("netmgr_dns_cache_hits_total").increment(1);
    }

    pub fn record_ssl_handshake_failure(&self) {
        self.ssl_handshake_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("netmgr_ssl_handshake_failures_total").increment(1);
    }

    pub fn record_partition_event(&self) {
        self.partition_events.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("netmgr_partition_events_total").increment(1);
    }

    pub fn set_websocket_connections(&self, count: usize) {
        self.websocket_connections.store(count as u64, Ordering::Relaxed);
        metrics::gauge!("netmgr_websocket_connections").set(count as f64);
    }

    pub fn dns_cache_hit_count(&self) -> u64 {
        self.dns_cache_hit_count.load(Ordering::Relaxed)
    }

    pub fn partition_events(&self) -> u64 {
        self.partition_events.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let average = self
            .average_response_time_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(0.0);

        MetricsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            average_response_time_ms: average,
            dns_cache_hit_count: self.dns_cache_hit_count.load(Ordering::Relaxed),
            ssl_handshake_failures: self.ssl_handshake_failures.load(Ordering::Relaxed),
            websocket_connections: self.websocket_connections.load(Ordering::Relaxed),
            network_errors: self.network_errors.load(Ordering::Relaxed),
            partition_events: self.partition_events.load(Ordering::Relaxed),
        }
    }
}

/// Publish the current status as a gauge.
pub fn record_network_status(code: u8) {
    metrics::gauge!("netmgr_network_status").set(f64::from(code));
}
