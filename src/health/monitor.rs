//! Periodic network status monitor.
//!
//! # Responsibilities
//! - Probe connectivity on a fixed interval and publish the status
//! - Purge expired DNS cache entries
//! - Sweep closed WebSockets from the registry

use std::sync::Arc;

use tokio::time::{self, MissedTickBehavior};

use crate::config::MonitorConfig;
use crate::dns::DnsResolver;
use crate::health::probe::{probe_status, Probe, ProbeReport};
use crate::health::state::{NetworkStatus, StatusCell};
use crate::lifecycle::ShutdownListener;
use crate::observability::metrics::record_network_status;
use crate::websocket::WebSocketRegistry;

/// Result of one monitor cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub probe: Option<ProbeReport>,
    pub status: NetworkStatus,
    pub dns_purged: usize,
    pub websockets_active: usize,
}

pub struct NetworkMonitor {
    config: MonitorConfig,
    probe: Arc<dyn Probe>,
    status: Arc<StatusCell>,
    dns: Arc<DnsResolver>,
    websockets: Arc<WebSocketRegistry>,
}

impl NetworkMonitor {
    pub fn new(
        config: MonitorConfig,
        probe: Arc<dyn Probe>,
        status: Arc<StatusCell>,
        dns: Arc<DnsResolver>,
        websockets: Arc<WebSocketRegistry>,
    ) -> Self {
        Self {
            config,
            probe,
            status,
            dns,
            websockets,
        }
    }

    /// Run until shutdown. The first cycle starts immediately.
    pub async fn run(self, mut shutdown: ShutdownListener) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            endpoints = self.config.health_check_urls.len(),
            "Network monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Network monitor received shutdown signal, exiting loop");
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let probe = probe_status(self.probe.as_ref(), &self.config.health_check_urls, self.config.probe_timeout()).await;

        let status = match &probe {
            Some(report) => {
                let (previous, now) = self.status.apply_probe(report.status);
                if previous != now {
                    tracing::info!(
                        from = %previous,
                        to = %now,
                        success_rate = report.success_rate,
                        "Network status changed"
                    );
                }
                now
            }
            None => self.status.get(),
        };
        record_network_status(status as u8);

        let dns_purged = self.dns.purge_expired();
        let websockets_active = self.websockets.sweep();

        tracing::debug!(
            status = %status,
            dns_purged,
            websockets_active,
            "Monitor cycle complete"
        );

        CycleReport {
            probe,
            status,
            dns_purged,
            websockets_active,
        }
    }
}
