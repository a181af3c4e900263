//! Network status state machine.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Process-wide connectivity status.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Connected = 0,
    Unstable = 1,
    Disconnected = 2,
    Partitioned = 3,
}

impl From<u8> for NetworkStatus {
    fn from(val: u8) -> Self {
        match val {
            0 => NetworkStatus::Connected,
            1 => NetworkStatus::Unstable,
            3 => NetworkStatus::Partitioned,
            _ => NetworkStatus::Disconnected,
        }
    }
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NetworkStatus::Connected => "connected",
            NetworkStatus::Unstable => "unstable",
            NetworkStatus::Disconnected => "disconnected",
            NetworkStatus::Partitioned => "partitioned",
        };
        f.write_str(name)
    }
}

/// Map a probe success rate to a status. Never yields `Partitioned`.
pub fn status_from_success_rate(rate: f64) -> NetworkStatus {
    if rate >= 0.8 {
        NetworkStatus::Connected
    } else if rate >= 0.5 {
        NetworkStatus::Unstable
    } else {
        NetworkStatus::Disconnected
    }
}

/// Atomic holder of the current [`NetworkStatus`].
#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(initial: NetworkStatus) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> NetworkStatus {
        NetworkStatus::from(self.0.load(Ordering::Acquire))
    }

    /// Apply a probe result. While partitioned, only a Connected or
    /// Unstable result replaces the status. Returns (previous, current).
    pub fn apply_probe(&self, probed: NetworkStatus) -> (NetworkStatus, NetworkStatus) {
        let result = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
            let current = NetworkStatus::from(raw);
            if current == NetworkStatus::Partitioned && probed == NetworkStatus::Disconnected {
                None
            } else {
                Some(probed as u8)
            }
        });
        match result {
            Ok(prev) => (NetworkStatus::from(prev), probed),
            Err(prev) => (NetworkStatus::from(prev), NetworkStatus::from(prev)),
        }
    }

    /// Enter `Partitioned`. Returns false if already partitioned.
    pub fn enter_partition(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (raw != NetworkStatus::Partitioned as u8).then_some(NetworkStatus::Partitioned as u8)
            })
            .is_ok()
    }

    /// Leave `Partitioned` for `Connected`. Returns false if not partitioned.
    pub fn clear_partition(&self) -> bool {
        self.0
            .compare_exchange(
                NetworkStatus::Partitioned as u8,
                NetworkStatus::Connected as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new(NetworkStatus::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_thresholds() {
        assert_eq!(status_from_success_rate(1.0), NetworkStatus::Connected);
        assert_eq!(status_from_success_rate(0.8), NetworkStatus::Connected);
        assert_eq!(status_from_success_rate(0.6), NetworkStatus::Unstable);
        assert_eq!(status_from_success_rate(0.5), NetworkStatus::Unstable);
        assert_eq!(status_from_success_rate(0.3), NetworkStatus::Disconnected);
        assert_eq!(status_from_success_rate(0.0), NetworkStatus::Disconnected);
    }

    #[test]
    fn test_enter_partition_once() {
        let cell = StatusCell::new(NetworkStatus::Connected);
        assert!(cell.enter_partition());
        assert!(!cell.enter_partition());
        assert_eq!(cell.get(), NetworkStatus::Partitioned);
    }

    #[test]
    fn test_disconnected_probe_keeps_partition() {
        let cell = StatusCell::new(NetworkStatus::Partitioned);
        let (prev, now) = cell.apply_probe(NetworkStatus::Disconnected);
        assert_eq!((prev, now), (NetworkStatus::Partitioned, NetworkStatus::Partitioned));

        let (_, now) = cell.apply_probe(NetworkStatus::Unstable);
        assert_eq!(now, NetworkStatus::Unstable);
    }

    #[test]
    fn test_clear_partition() {
        let cell = StatusCell::new(NetworkStatus::Unstable);
        assert!(!cell.clear_partition());
        cell.enter_partition();
        assert!(cell.clear_partition());
        assert_eq!(cell.get(), NetworkStatus::Connected);
    }
}
