//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Initialize()
//!     → tls.rs (build TLS context from ConnectionConfig, degrade or fail)
//!     → pool.rs (build the shared HTTP client around the context)
//!
//! MakeRequest()
//!     → connection.rs (per-host + total permits, in-flight tracking)
//!     → pool.rs client (connect via cached DNS, send, receive)
//! ```
//!
//! # Design Decisions
//! - Exactly one pool per manager, swapped in/out atomically
//! - Connection caps enforced by semaphores (backpressure, not rejection)
//! - TLS is optional unless ssl_mode = required

pub mod connection;
pub mod pool;
pub mod tls;

pub use connection::{ConnectionId, ConnectionLimiter, ConnectionPermit};
pub use pool::{ConnectionPool, PooledClient};
pub use tls::{build_tls_context, TlsContext, TlsSummary};
