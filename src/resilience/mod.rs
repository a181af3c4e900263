//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! DNS lookup / TLS setup:
//!     → circuit_breaker.rs (fail fast while the dependency is known-bad)
//!
//! Partition recovery:
//!     → backoff.rs (bounded exponential delay between status checks)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency (DNS, TLS), not one global breaker
//! - Recovery is capped; nothing here retries forever

pub mod backoff;
pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitError, CircuitSnapshot, CircuitState};
