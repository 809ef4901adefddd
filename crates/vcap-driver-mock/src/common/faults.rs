//! Fault injection for the mock register bus.
//!
//! Faults are keyed by register address and direction. A fault either fails
//! every matching transaction or only the next `n` of them, which is how tests
//! model a channel whose detect register glitches for one poll.

use super::rng::MockRng;
use std::collections::HashMap;
use vcap_core::TransportError;

/// Transaction direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Register read.
    Read,
    /// Register write.
    Write,
}

/// How many matching transactions a fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCount {
    /// Every matching transaction fails.
    Always,
    /// Only the next `n` matching transactions fail.
    Times(u32),
}

/// Injected faults plus the random failure rate of chaos mode.
#[derive(Debug, Default)]
pub struct FaultTable {
    faults: HashMap<(Access, u16), FaultCount>,
    disconnected: bool,
    random_rate: f64,
    rng: MockRng,
}

impl FaultTable {
    /// Empty table. `seed` fixes the random failure sequence.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: MockRng::new(seed),
            ..Self::default()
        }
    }

    /// Fail transactions of `access` on `addr`, replacing any earlier fault.
    pub fn inject(&mut self, access: Access, addr: u16, count: FaultCount) {
        self.faults.insert((access, addr), count);
    }

    /// Fail every transaction with [`TransportError::Disconnected`].
    pub fn set_disconnected(&mut self, disconnected: bool) {
        self.disconnected = disconnected;
    }

    /// Probability of a random I/O failure per transaction.
    pub fn set_random_rate(&mut self, rate: f64) {
        self.random_rate = rate;
    }

    /// Remove all faults, reconnect and stop random failures.
    pub fn clear(&mut self) {
        self.faults.clear();
        self.disconnected = false;
        self.random_rate = 0.0;
    }

    /// Decide whether this transaction fails, consuming a counted fault.
    pub fn check(&mut self, access: Access, addr: u16) -> Result<(), TransportError> {
        if self.disconnected {
            return Err(TransportError::Disconnected);
        }
        if let Some(count) = self.faults.get_mut(&(access, addr)) {
            match count {
                FaultCount::Always => return Err(TransportError::Nack { addr }),
                FaultCount::Times(n) if *n > 0 => {
                    *n -= 1;
                    if *n == 0 {
                        self.faults.remove(&(access, addr));
                    }
                    return Err(TransportError::Nack { addr });
                }
                FaultCount::Times(_) => {}
            }
        }
        if self.rng.should_fail(self.random_rate) {
            return Err(TransportError::Io {
                addr,
                message: "injected random failure".into(),
            });
        }
        Ok(())
    }
}
