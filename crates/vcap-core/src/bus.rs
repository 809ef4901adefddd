//! Register transport abstraction.
//!
//! Drivers talk to their chip exclusively through [`RegisterBus`]: 16-bit
//! register addresses, 8-bit values, one transaction at a time. Real
//! implementations wrap an I2C adapter; tests use the mock bus from
//! `vcap-driver-mock`.
//!
//! Register programs are applied with [`RegisterBus::write_sequence`], which
//! runs every entry even after a failure and returns a [`WriteReport`]. A
//! partially configured chip is more useful than one left half-way through a
//! program, so callers decide what to do with the aggregate.

use crate::error::{SequenceError, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One entry of a register program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegVal {
    /// Register address.
    pub addr: u16,
    /// Value to write.
    pub val: u8,
    /// Delay after the write, in milliseconds.
    pub delay_ms: u16,
}

impl RegVal {
    /// Write with no trailing delay.
    pub const fn new(addr: u16, val: u8) -> Self {
        Self {
            addr,
            val,
            delay_ms: 0,
        }
    }

    /// Write followed by a `delay_ms` pause.
    pub const fn with_delay(addr: u16, val: u8, delay_ms: u16) -> Self {
        Self {
            addr,
            val,
            delay_ms,
        }
    }
}

/// Outcome of a register program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    attempted: usize,
    failures: Vec<TransportError>,
}

impl WriteReport {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of one write.
    pub fn record(&mut self, result: Result<(), TransportError>) {
        self.attempted += 1;
        if let Err(e) = result {
            self.failures.push(e);
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: WriteReport) {
        self.attempted += other.attempted;
        self.failures.extend(other.failures);
    }

    /// Writes issued so far.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Failed writes in program order.
    pub fn failures(&self) -> &[TransportError] {
        &self.failures
    }

    /// True when every write succeeded.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into a result, keeping the first failure as the cause.
    pub fn into_result(self) -> Result<(), SequenceError> {
        match self.failures.first() {
            None => Ok(()),
            Some(first) => Err(SequenceError {
                attempted: self.attempted,
                failed: self.failures.len(),
                first: first.clone(),
            }),
        }
    }
}

/// Synchronous-in-spirit register access: every call completes one bus
/// transaction before returning.
#[async_trait]
pub trait RegisterBus: Send + Sync {
    /// Read one 8-bit register.
    async fn read(&self, addr: u16) -> Result<u8, TransportError>;

    /// Write one 8-bit register.
    async fn write(&self, addr: u16, val: u8) -> Result<(), TransportError>;

    /// Apply a register program in order, honouring per-entry delays.
    ///
    /// Never stops early; failures are collected in the returned report.
    async fn write_sequence(&self, regs: &[RegVal]) -> WriteReport {
        let mut report = WriteReport::new();
        for reg in regs {
            let result = self.write(reg.addr, reg.val).await;
            if let Err(e) = &result {
                tracing::warn!(addr = format_args!("{:#06x}", reg.addr), error = %e, "register write failed");
            }
            report.record(result);
            if reg.delay_ms != 0 {
                tokio::time::sleep(Duration::from_millis(u64::from(reg.delay_ms))).await;
            }
        }
        report
    }
}

/// Shared handle to a register bus.
pub type SharedBus = Arc<dyn RegisterBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FlakyBus {
        fail_addr: u16,
        writes: Mutex<Vec<(u16, u8)>>,
    }

    #[async_trait]
    impl RegisterBus for FlakyBus {
        async fn read(&self, addr: u16) -> Result<u8, TransportError> {
            Err(TransportError::Nack { addr })
        }

        async fn write(&self, addr: u16, val: u8) -> Result<(), TransportError> {
            self.writes.lock().push((addr, val));
            if addr == self.fail_addr {
                Err(TransportError::Nack { addr })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_write_sequence_runs_to_completion() {
        let bus = FlakyBus {
            fail_addr: 0x5005,
            writes: Mutex::new(Vec::new()),
        };
        let program = [
            RegVal::new(0x5004, 0x00),
            RegVal::new(0x5005, 0x00),
            RegVal::new(0x5006, 0x00),
            RegVal::new(0x5007, 0x01),
        ];

        let report = bus.write_sequence(&program).await;

        assert_eq!(bus.writes.lock().len(), 4);
        assert_eq!(report.attempted(), 4);
        assert_eq!(report.failures().len(), 1);
        let err = report.into_result().unwrap_err();
        assert_eq!(err.failed, 1);
        assert_eq!(err.first, TransportError::Nack { addr: 0x5005 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_sequence_honours_delay() {
        let bus = FlakyBus {
            fail_addr: 0xffff,
            writes: Mutex::new(Vec::new()),
        };
        let start = tokio::time::Instant::now();
        let report = bus
            .write_sequence(&[RegVal::with_delay(0x0001, 0x01, 20), RegVal::new(0x0002, 0x02)])
            .await;
        assert!(report.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_report_merge() {
        let mut a = WriteReport::new();
        a.record(Ok(()));
        let mut b = WriteReport::new();
        b.record(Err(TransportError::Disconnected));
        a.merge(b);
        assert_eq!(a.attempted(), 2);
        assert!(!a.is_ok());
    }
}
