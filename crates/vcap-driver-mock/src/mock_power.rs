//! Simulated power, clock and pinctrl collaborator.
//!
//! Records every call so tests can assert on the exact power sequence a
//! driver issued.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use vcap_core::{GpioLine, PinState, PowerControl, PowerError};

/// One recorded collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCall {
    /// Line driven to a level.
    SetLine(GpioLine, bool),
    /// Clock rate requested, in Hz.
    SetClockRate(u64),
    /// Clock enable attempted.
    EnableClock,
    /// Clock disabled.
    DisableClock,
    /// Pinctrl state selected.
    SelectPins(PinState),
}

#[derive(Debug, Default)]
struct PowerState {
    calls: Vec<PowerCall>,
    levels: HashMap<GpioLine, bool>,
    clock_enabled: bool,
    pins: Option<PinState>,
}

/// In-memory [`PowerControl`].
#[derive(Debug)]
pub struct MockPowerControl {
    lines: HashSet<GpioLine>,
    has_pinctrl: bool,
    /// Rate the clock actually settles at; `None` accepts whatever is asked.
    clock_rate_override: Option<u64>,
    fail_clock_enable: bool,
    state: Mutex<PowerState>,
}

impl MockPowerControl {
    /// All lines wired, pinctrl present, clock accepts any rate.
    pub fn new() -> Self {
        Self {
            lines: [GpioLine::Reset, GpioLine::Power, GpioLine::Camera]
                .into_iter()
                .collect(),
            has_pinctrl: true,
            clock_rate_override: None,
            fail_clock_enable: false,
            state: Mutex::new(PowerState::default()),
        }
    }

    /// Leave `line` unwired.
    pub fn without_line(mut self, line: GpioLine) -> Self {
        self.lines.remove(&line);
        self
    }

    /// Board without pinctrl; pin selection succeeds without effect.
    pub fn without_pinctrl(mut self) -> Self {
        self.has_pinctrl = false;
        self
    }

    /// Clock settles at `hz` whatever rate is requested.
    pub fn with_clock_rate(mut self, hz: u64) -> Self {
        self.clock_rate_override = Some(hz);
        self
    }

    /// Clock enable always fails.
    pub fn with_failing_clock(mut self) -> Self {
        self.fail_clock_enable = true;
        self
    }

    /// Recorded calls in order.
    pub fn calls(&self) -> Vec<PowerCall> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Last level driven on `line`, if any.
    pub fn line_level(&self, line: GpioLine) -> Option<bool> {
        self.state.lock().levels.get(&line).copied()
    }

    /// Whether the clock is currently running.
    pub fn clock_enabled(&self) -> bool {
        self.state.lock().clock_enabled
    }

    /// Last selected pinctrl state.
    pub fn pins(&self) -> Option<PinState> {
        self.state.lock().pins
    }
}

impl Default for MockPowerControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PowerControl for MockPowerControl {
    fn has_line(&self, line: GpioLine) -> bool {
        self.lines.contains(&line)
    }

    async fn set_line(&self, line: GpioLine, high: bool) -> Result<(), PowerError> {
        if !self.lines.contains(&line) {
            return Err(PowerError::MissingLine(line.name()));
        }
        let mut state = self.state.lock();
        state.calls.push(PowerCall::SetLine(line, high));
        state.levels.insert(line, high);
        Ok(())
    }

    async fn set_clock_rate(&self, hz: u64) -> Result<u64, PowerError> {
        self.state.lock().calls.push(PowerCall::SetClockRate(hz));
        Ok(self.clock_rate_override.unwrap_or(hz))
    }

    async fn enable_clock(&self) -> Result<(), PowerError> {
        let mut state = self.state.lock();
        state.calls.push(PowerCall::EnableClock);
        if self.fail_clock_enable {
            return Err(PowerError::Clock("enable refused".into()));
        }
        state.clock_enabled = true;
        Ok(())
    }

    async fn disable_clock(&self) {
        let mut state = self.state.lock();
        state.calls.push(PowerCall::DisableClock);
        state.clock_enabled = false;
    }

    async fn select_pins(&self, pins: PinState) -> Result<(), PowerError> {
        if !self.has_pinctrl {
            return Ok(());
        }
        let mut state = self.state.lock();
        state.calls.push(PowerCall::SelectPins(pins));
        state.pins = Some(pins);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let power = MockPowerControl::new();
        power.set_line(GpioLine::Power, true).await.unwrap();
        power.enable_clock().await.unwrap();
        power.disable_clock().await;
        assert_eq!(
            power.calls(),
            vec![
                PowerCall::SetLine(GpioLine::Power, true),
                PowerCall::EnableClock,
                PowerCall::DisableClock,
            ]
        );
        assert!(!power.clock_enabled());
    }

    #[tokio::test]
    async fn test_missing_line_is_reported() {
        let power = MockPowerControl::new().without_line(GpioLine::Camera);
        assert!(!power.has_line(GpioLine::Camera));
        assert_eq!(
            power.set_line(GpioLine::Camera, true).await,
            Err(PowerError::MissingLine("camera"))
        );
    }

    #[tokio::test]
    async fn test_clock_rate_override() {
        let power = MockPowerControl::new().with_clock_rate(24_000_000);
        assert_eq!(power.set_clock_rate(27_000_000).await.unwrap(), 24_000_000);
    }
}
