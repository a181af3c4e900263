//! Error types for the network manager.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::config::loader::ConfigError;

/// Errors surfaced by the network manager's public operations.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Every resolver failed and no cached entry was available.
    #[error("DNS resolution failed for '{hostname}': {reason}")]
    DnsResolutionFailed { hostname: String, reason: String },

    /// The connection pool has not been created (or was torn down).
    #[error("Connection pool not initialized")]
    PoolNotInitialized,

    /// TLS context construction failed in `required` mode.
    #[error("TLS initialization failed: {0}")]
    TlsInitFailed(String),

    /// The outbound request failed at the transport level.
    #[error("{method} {url} failed: {source}")]
    RequestFailed {
        method: String,
        url: String,
        /// Set when the failure matched a partition indicator.
        partition: Option<PartitionReason>,
        #[source]
        source: reqwest::Error,
    },

    /// A partition was detected. Used as a signal; failed requests still
    /// surface as `RequestFailed`.
    #[error("Network partition detected: {0}")]
    PartitionDetected(PartitionReason),

    /// The request could not be built (bad URL, missing host, bad header).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Discriminant of [`NetworkError`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkErrorKind {
    DnsResolutionFailed,
    PoolNotInitialized,
    TlsInitFailed,
    RequestFailed,
    PartitionDetected,
    InvalidRequest,
    Config,
}

impl NetworkError {
    pub fn kind(&self) -> NetworkErrorKind {
        match self {
            NetworkError::DnsResolutionFailed { .. } => NetworkErrorKind::DnsResolutionFailed,
            NetworkError::PoolNotInitialized => NetworkErrorKind::PoolNotInitialized,
            NetworkError::TlsInitFailed(_) => NetworkErrorKind::TlsInitFailed,
            NetworkError::RequestFailed { .. } => NetworkErrorKind::RequestFailed,
            NetworkError::PartitionDetected(_) => NetworkErrorKind::PartitionDetected,
            NetworkError::InvalidRequest(_) => NetworkErrorKind::InvalidRequest,
            NetworkError::Config(_) => NetworkErrorKind::Config,
        }
    }

    /// The partition reason carried by this error, if any.
    pub fn partition_reason(&self) -> Option<PartitionReason> {
        match self {
            NetworkError::RequestFailed { partition, .. } => *partition,
            NetworkError::PartitionDetected(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Result type for network manager operations.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Transport failures that indicate a network partition rather than an
/// isolated error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionReason {
    ConnectionRefused,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionTimedOut,
    NameResolution,
}

/// Lower-cased message fragments recognised at the transport boundary.
const PARTITION_INDICATORS: [(&str, PartitionReason); 5] = [
    ("connection refused", PartitionReason::ConnectionRefused),
    ("network unreachable", PartitionReason::NetworkUnreachable),
    ("no route to host", PartitionReason::HostUnreachable),
    ("connection timed out", PartitionReason::ConnectionTimedOut),
    ("temporary failure in name resolution", PartitionReason::NameResolution),
];

impl PartitionReason {
    /// Case-insensitive substring match against the known indicators.
    ///
    /// Only for transport layers that expose nothing but text.
    pub fn from_message(message: &str) -> Option<Self> {
        let lowered = message.to_lowercase();
        PARTITION_INDICATORS
            .iter()
            .find(|(needle, _)| lowered.contains(needle))
            .map(|(_, reason)| *reason)
    }

    /// Classify an error by walking its source chain.
    ///
    /// Typed signals (io error kinds, reqwest connect timeouts) are checked
    /// first; the rendered chain text is matched as a fallback.
    pub fn classify(error: &(dyn StdError + 'static)) -> Option<Self> {
        let mut rendered = String::new();
        let mut current: Option<&(dyn StdError + 'static)> = Some(error);

        while let Some(err) = current {
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                match io_err.kind() {
                    io::ErrorKind::ConnectionRefused => return Some(PartitionReason::ConnectionRefused),
                    io::ErrorKind::TimedOut => return Some(PartitionReason::ConnectionTimedOut),
                    _ => {}
                }
            }
            if let Some(req_err) = err.downcast_ref::<reqwest::Error>() {
                if req_err.is_connect() && req_err.is_timeout() {
                    return Some(PartitionReason::ConnectionTimedOut);
                }
            }
            if !rendered.is_empty() {
                rendered.push_str(": ");
            }
            rendered.push_str(&err.to_string());
            current = err.source();
        }

        Self::from_message(&rendered)
    }
}

impl fmt::Display for PartitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = PARTITION_INDICATORS
            .iter()
            .find(|(_, reason)| reason == self)
            .map(|(needle, _)| *needle)
            .unwrap_or("unknown");
        f.write_str(text)
    }
}
