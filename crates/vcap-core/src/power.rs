//! Power, clock and pin control collaborators.
//!
//! A capture front-end needs a handful of board resources beyond the
//! register bus: reset and power gpio lines, the reference clock, and the
//! pinctrl states for the sensor pads. [`PowerControl`] bundles them so a
//! driver's power sequence can be written once and exercised against a mock.

use crate::error::PowerError;
use async_trait::async_trait;
use std::sync::Arc;

/// Board gpio lines a capture driver may toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpioLine {
    /// Chip reset, active low.
    Reset,
    /// Chip supply enable.
    Power,
    /// Supply for the attached cameras.
    Camera,
}

impl GpioLine {
    /// Name used in logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            GpioLine::Reset => "reset",
            GpioLine::Power => "power",
            GpioLine::Camera => "camera",
        }
    }
}

/// Named pin multiplexing states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    /// Pads muxed for normal operation.
    Default,
    /// Low-power pad state used while the chip is off.
    Sleep,
}

/// Board resources a driver's power sequence drives.
#[async_trait]
pub trait PowerControl: Send + Sync {
    /// Whether `line` is wired on this board. Unwired lines are skipped by
    /// power sequences.
    fn has_line(&self, line: GpioLine) -> bool;

    /// Drive a gpio line. `high` is the logical asserted level.
    async fn set_line(&self, line: GpioLine, high: bool) -> Result<(), PowerError>;

    /// Request a reference clock rate, returning the rate actually applied.
    async fn set_clock_rate(&self, hz: u64) -> Result<u64, PowerError>;

    /// Start the reference clock.
    async fn enable_clock(&self) -> Result<(), PowerError>;

    /// Stop the reference clock. Never fails.
    async fn disable_clock(&self);

    /// Select a pinctrl state. Boards without pinctrl return `Ok(())`.
    async fn select_pins(&self, state: PinState) -> Result<(), PowerError>;
}

/// Shared handle to a power controller.
pub type SharedPower = Arc<dyn PowerControl>;
