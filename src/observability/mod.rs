//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (NetworkMetrics record + `metrics` facade)
//!
//! Consumers:
//!     → GetNetworkStatus snapshot (in-process)
//!     → Whatever recorder/subscriber the host service installs
//! ```
//!
//! # Design Decisions
//! - Metrics are cheap (atomic increments, one mutex for the EMA)
//! - The facade is a no-op until the host installs a recorder

pub mod logging;
pub mod metrics;

pub use self::metrics::{MetricsSnapshot, NetworkMetrics};
