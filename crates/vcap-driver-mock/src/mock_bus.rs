//! Simulated register bus.
//!
//! Holds a sparse register map and logs every transaction. Registers that
//! were never written read back as zero. Tests can script a sequence of read
//! values for one address (the last value sticks) to model an input that
//! changes between polls.

use crate::common::{Access, FaultCount, FaultTable, MockMode};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use vcap_core::{RegisterBus, TransportError};

/// One logged bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    /// Read of the register.
    Read(u16),
    /// Write of a value to the register.
    Write(u16, u8),
}

#[derive(Debug, Default)]
struct BusState {
    registers: HashMap<u16, u8>,
    scripts: HashMap<u16, VecDeque<u8>>,
    log: Vec<Transaction>,
    faults: FaultTable,
}

/// In-memory [`RegisterBus`].
#[derive(Debug)]
pub struct MockRegisterBus {
    mode: MockMode,
    state: Mutex<BusState>,
}

impl MockRegisterBus {
    /// Instant mode, no faults.
    pub fn new() -> Self {
        Self::with_mode(MockMode::Instant)
    }

    /// Bus with the timing and failure rate of `mode`.
    pub fn with_mode(mode: MockMode) -> Self {
        let mut faults = FaultTable::new(None);
        faults.set_random_rate(mode.failure_rate());
        Self {
            mode,
            state: Mutex::new(BusState {
                faults,
                ..BusState::default()
            }),
        }
    }

    /// Chaos mode with a fixed seed, for reproducible failure patterns.
    pub fn chaos_seeded(seed: u64) -> Self {
        let mut faults = FaultTable::new(Some(seed));
        faults.set_random_rate(MockMode::Chaos.failure_rate());
        Self {
            mode: MockMode::Chaos,
            state: Mutex::new(BusState {
                faults,
                ..BusState::default()
            }),
        }
    }

    /// Mode the bus was built with.
    pub fn mode(&self) -> MockMode {
        self.mode
    }

    /// Preset a register value without logging a transaction.
    pub fn set_register(&self, addr: u16, val: u8) {
        let mut state = self.state.lock();
        state.scripts.remove(&addr);
        state.registers.insert(addr, val);
    }

    /// Current register value as the device would see it.
    pub fn register(&self, addr: u16) -> u8 {
        self.state.lock().registers.get(&addr).copied().unwrap_or(0)
    }

    /// Queue values returned by successive reads of `addr`. Once the queue
    /// drains, the last value stays in the register.
    pub fn script_reads(&self, addr: u16, values: impl IntoIterator<Item = u8>) {
        self.state
            .lock()
            .scripts
            .insert(addr, values.into_iter().collect());
    }

    /// Inject read failures on `addr`.
    pub fn fail_reads(&self, addr: u16, count: FaultCount) {
        self.state.lock().faults.inject(Access::Read, addr, count);
    }

    /// Inject write failures on `addr`. Failed writes leave the register
    /// unchanged.
    pub fn fail_writes(&self, addr: u16, count: FaultCount) {
        self.state.lock().faults.inject(Access::Write, addr, count);
    }

    /// Simulate the adapter going away.
    pub fn set_disconnected(&self, disconnected: bool) {
        self.state.lock().faults.set_disconnected(disconnected);
    }

    /// Drop every injected fault.
    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Every transaction since creation or the last [`clear_log`](Self::clear_log).
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().log.clone()
    }

    /// Writes only, in order.
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.state
            .lock()
            .log
            .iter()
            .filter_map(|t| match *t {
                Transaction::Write(addr, val) => Some((addr, val)),
                Transaction::Read(_) => None,
            })
            .collect()
    }

    /// Forget logged transactions.
    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    async fn latency(&self) {
        let delay = self.mode.transaction_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockRegisterBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegisterBus for MockRegisterBus {
    async fn read(&self, addr: u16) -> Result<u8, TransportError> {
        self.latency().await;
        let mut state = self.state.lock();
        state.log.push(Transaction::Read(addr));
        state.faults.check(Access::Read, addr)?;

        let BusState {
            registers, scripts, ..
        } = &mut *state;
        if let Some(queue) = scripts.get_mut(&addr) {
            if let Some(val) = queue.pop_front() {
                registers.insert(addr, val);
            }
            if queue.is_empty() {
                scripts.remove(&addr);
            }
        }
        let val = registers.get(&addr).copied().unwrap_or(0);
        tracing::trace!(addr = format_args!("{:#06x}", addr), val, "mock read");
        Ok(val)
    }

    async fn write(&self, addr: u16, val: u8) -> Result<(), TransportError> {
        self.latency().await;
        let mut state = self.state.lock();
        state.log.push(Transaction::Write(addr, val));
        state.faults.check(Access::Write, addr)?;
        state.registers.insert(addr, val);
        tracing::trace!(addr = format_args!("{:#06x}", addr), val, "mock write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unwritten_register_reads_zero() {
        let bus = MockRegisterBus::new();
        assert_eq!(bus.read(0x40f0).await.unwrap(), 0);
        assert_eq!(bus.transactions(), vec![Transaction::Read(0x40f0)]);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let bus = MockRegisterBus::new();
        bus.write(0x0e08, 1).await.unwrap();
        assert_eq!(bus.read(0x0e08).await.unwrap(), 1);
        assert_eq!(bus.writes(), vec![(0x0e08, 1)]);
    }

    #[tokio::test]
    async fn test_scripted_reads_stick_on_last_value() {
        let bus = MockRegisterBus::new();
        bus.script_reads(0x1000, [0x10, 0x00]);
        assert_eq!(bus.read(0x1000).await.unwrap(), 0x10);
        assert_eq!(bus.read(0x1000).await.unwrap(), 0x00);
        assert_eq!(bus.read(0x1000).await.unwrap(), 0x00);
    }

    #[tokio::test]
    async fn test_failed_write_is_logged_but_not_applied() {
        let bus = MockRegisterBus::new();
        bus.fail_writes(0x5004, FaultCount::Times(1));
        assert!(bus.write(0x5004, 1).await.is_err());
        assert_eq!(bus.register(0x5004), 0);
        assert!(bus.write(0x5004, 1).await.is_ok());
        assert_eq!(bus.register(0x5004), 1);
        assert_eq!(bus.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_chaos_mode_eventually_fails() {
        let bus = MockRegisterBus::chaos_seeded(11);
        let mut failures = 0;
        for _ in 0..400 {
            if bus.read(0x0000).await.is_err() {
                failures += 1;
            }
        }
        assert!(failures > 0);
    }
}
