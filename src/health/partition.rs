//! Partition detection and bounded recovery.
//!
//! # Responsibilities
//! - Enter `Partitioned` once per episode and count the event
//! - Re-probe with exponential backoff until the network returns
//! - Give up after a bounded number of attempts

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::{MonitorConfig, RecoveryConfig};
use crate::error::PartitionReason;
use crate::health::probe::{probe_status, Probe};
use crate::health::state::{NetworkStatus, StatusCell};
use crate::lifecycle::ShutdownListener;
use crate::observability::metrics::record_network_status;
use crate::observability::NetworkMetrics;
use crate::resilience::backoff::recovery_delay;

/// Record a partition signal. Returns true only on the transition into
/// `Partitioned`; repeated signals inside one episode are ignored.
pub fn record_partition(status: &StatusCell, metrics: &NetworkMetrics, reason: PartitionReason) -> bool {
    if !status.enter_partition() {
        tracing::debug!(reason = %reason, "Partition signal while already partitioned");
        return false;
    }

    metrics.record_partition_event();
    record_network_status(NetworkStatus::Partitioned as u8);
    tracing::warn!(reason = %reason, "Network partition detected");
    true
}

/// How a recovery run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// Status left `Partitioned` after `attempts` attempts.
    Recovered { attempts: u32 },
    /// Every attempt ran and the network is still partitioned.
    Exhausted { attempts: u32 },
    /// Shutdown arrived first.
    Cancelled,
}

/// Background recovery from a detected partition.
pub struct PartitionRecovery {
    probe: Arc<dyn Probe>,
    urls: Vec<String>,
    probe_timeout: Duration,
    policy: RecoveryConfig,
    status: Arc<StatusCell>,
}

impl PartitionRecovery {
    pub fn new(
        probe: Arc<dyn Probe>,
        monitor: &MonitorConfig,
        policy: RecoveryConfig,
        status: Arc<StatusCell>,
    ) -> Self {
        Self {
            probe,
            urls: monitor.health_check_urls.clone(),
            probe_timeout: monitor.probe_timeout(),
            policy,
            status,
        }
    }

    pub async fn run(self, mut shutdown: ShutdownListener) -> RecoveryOutcome {
        let base = Duration::from_secs(self.policy.base_delay_secs);
        tracing::info!(max_attempts = self.policy.max_attempts, "Partition recovery started");

        for attempt in 0..self.policy.max_attempts {
            let delay = recovery_delay(attempt, base, self.policy.max_exponent);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::info!(attempt, "Partition recovery cancelled");
                    return RecoveryOutcome::Cancelled;
                }
            }

            // A successful request may have cleared the partition meanwhile.
            if self.status.get() == NetworkStatus::Partitioned {
                let report = tokio::select! {
                    report = probe_status(self.probe.as_ref(), &self.urls, self.probe_timeout) => report,
                    _ = shutdown.recv() => return RecoveryOutcome::Cancelled,
                };
                if let Some(report) = report {
                    let (_, now) = self.status.apply_probe(report.status);
                    tracing::debug!(
                        attempt = attempt + 1,
                        success_rate = report.success_rate,
                        status = %now,
                        "Recovery probe"
                    );
                }
            }

            let now = self.status.get();
            if now != NetworkStatus::Partitioned {
                record_network_status(now as u8);
                tracing::info!(attempts = attempt + 1, status = %now, "Network partition recovered");
                return RecoveryOutcome::Recovered { attempts: attempt + 1 };
            }
        }

        tracing::error!(
            attempts = self.policy.max_attempts,
            "Partition recovery gave up; network still partitioned"
        );
        RecoveryOutcome::Exhausted {
            attempts: self.policy.max_attempts,
        }
    }
}
