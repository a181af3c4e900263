//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Initialize():
//!     Build TLS context → Create pool → Reset shutdown signal → Spawn monitor
//!
//! Cleanup():
//!     Trigger shutdown → Await monitor + recovery → Close WebSockets → Close pool
//! ```
//!
//! # Design Decisions
//! - Background tasks are supervised: the manager keeps their handles
//! - Cancellation is a normal exit path, never an error

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownListener};
