//! Mock collaborators for vcap drivers.
//!
//! Simulated hardware for testing drivers without a board. All mocks use
//! async-safe waits (`tokio::time::sleep`, never `std::thread::sleep`).
//!
//! - [`MockRegisterBus`] - register map with transaction log, scripted reads
//!   and per-register fault injection
//! - [`MockPowerControl`] - gpio/clock/pinctrl recorder
//!
//! ```rust,ignore
//! use vcap_driver_mock::{MockRegisterBus, FaultCount};
//!
//! let bus = MockRegisterBus::new();
//! bus.set_register(0x40f0, 0x99);
//! bus.fail_reads(0x1000, FaultCount::Times(1));
//! ```

pub mod common;
mod mock_bus;
mod mock_power;

pub use common::{Access, FaultCount, MockMode, MockRng};
pub use mock_bus::{MockRegisterBus, Transaction};
pub use mock_power::{MockPowerControl, PowerCall};
