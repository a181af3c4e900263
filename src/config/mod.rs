//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → NetworkConfig (validated, immutable)
//!     → shared via Arc with every manager component
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no component mutates it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ConnectionConfig;
pub use schema::CorsConfig;
pub use schema::DnsConfig;
pub use schema::Environment;
pub use schema::MonitorConfig;
pub use schema::NetworkConfig;
pub use schema::ObservabilityConfig;
pub use schema::RecoveryConfig;
pub use schema::SslMode;
pub use schema::WebSocketConfig;
