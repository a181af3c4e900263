//! Network health subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic monitor (monitor.rs):
//!     Ticker (monitor.interval_secs)
//!     → probe.rs: GET every health-check URL, success rate → status
//!     → state.rs: publish Connected / Unstable / Disconnected
//!     → purge expired DNS entries, sweep stale WebSockets
//!
//! Partition detection (partition.rs):
//!     Failed request classified as a partition
//!     → state.rs: enter Partitioned (once), count the event
//!     → spawn PartitionRecovery (bounded backoff, re-probe)
//! ```
//!
//! # State Machine
//! ```text
//! probe rate ≥ 0.8 → Connected
//! probe rate ≥ 0.5 → Unstable
//! otherwise        → Disconnected
//! partition signal → Partitioned (never produced by the probe)
//! Partitioned → Connected/Unstable: probe recovers or a request succeeds
//! ```
//!
//! # Design Decisions
//! - A single atomic status cell; writers use compare-and-swap
//! - A Disconnected probe never clears Partitioned
//! - Recovery is supervised and cancelled with the monitor

pub mod monitor;
pub mod partition;
pub mod probe;
pub mod state;

pub use monitor::{CycleReport, NetworkMonitor};
pub use partition::{record_partition, PartitionRecovery, RecoveryOutcome};
pub use probe::{probe_status, HttpProbe, Probe, ProbeReport};
pub use state::{status_from_success_rate, NetworkStatus, StatusCell};
