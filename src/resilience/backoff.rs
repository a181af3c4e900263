//! Bounded exponential backoff for partition recovery.

use std::time::Duration;

/// Delay before recovery attempt `attempt` (zero-based):
/// `base * 2^min(attempt, max_exponent)`.
pub fn recovery_delay(attempt: u32, base: Duration, max_exponent: u32) -> Duration {
    let exponent = attempt.min(max_exponent);
    base.saturating_mul(2u32.saturating_pow(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_delay_doubles_then_caps() {
        let base = Duration::from_secs(5);
        let delays: Vec<u64> = (0..10).map(|a| recovery_delay(a, base, 5).as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 160, 160, 160, 160]);
    }

    #[test]
    fn test_zero_base() {
        assert_eq!(recovery_delay(3, Duration::ZERO, 5), Duration::ZERO);
    }
}
