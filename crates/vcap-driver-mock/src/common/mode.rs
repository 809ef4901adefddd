//! Operational modes for mock collaborators.
//!
//! - **Instant**: no transaction latency, deterministic
//! - **Realistic**: roughly the latency of a 400 kHz I2C transaction
//! - **Chaos**: realistic latency plus random transport failures

use std::time::Duration;

/// Timing and failure behaviour of a mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    /// Zero delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Bus-like timing - for integration tests
    Realistic,
    /// Random failures on top of realistic timing - for resilience testing
    Chaos,
}

impl MockMode {
    /// Latency added to every register transaction.
    pub fn transaction_delay(self) -> Duration {
        match self {
            MockMode::Instant => Duration::ZERO,
            MockMode::Realistic | MockMode::Chaos => Duration::from_micros(100),
        }
    }

    /// Probability that a single transaction fails.
    pub fn failure_rate(self) -> f64 {
        match self {
            MockMode::Chaos => 0.05,
            MockMode::Instant | MockMode::Realistic => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        assert_eq!(MockMode::default(), MockMode::Instant);
        assert_eq!(MockMode::Instant.transaction_delay(), Duration::ZERO);
    }

    #[test]
    fn test_only_chaos_fails() {
        assert_eq!(MockMode::Realistic.failure_rate(), 0.0);
        assert!(MockMode::Chaos.failure_rate() > 0.0);
    }
}
