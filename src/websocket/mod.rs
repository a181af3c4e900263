//! WebSocket connection registry.
//!
//! # Responsibilities
//! - Track WebSocket handles owned by other parts of the service
//! - Flag (not refuse) registrations beyond the configured cap
//! - Sweep closed or dropped handles during monitor cycles
//! - Close every live handle on cleanup
//!
//! # Design Decisions
//! - The registry holds weak references; owners keep handles alive
//! - Handles are trait objects so any WebSocket library can plug in

pub mod registry;

pub use registry::{WebSocketError, WebSocketHandle, WebSocketId, WebSocketRegistry};
