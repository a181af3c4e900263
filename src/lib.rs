//! Outbound network communication manager.

pub mod config;
pub mod dns;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod manager;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod websocket;

pub use config::schema::NetworkConfig;
pub use error::{NetworkError, NetworkResult, PartitionReason};
pub use health::NetworkStatus;
pub use manager::{NetworkManager, NetworkStatusReport, RequestOptions};
pub use websocket::{WebSocketHandle, WebSocketId};
