//! Power-up and power-down sequences.

use crate::regs::XVCLK_FREQ;
use std::time::Duration;
use tokio::time::sleep;
use vcap_core::{GpioLine, PinState, PowerControl, PowerError};

const POWER_RAMP: Duration = Duration::from_millis(25);
const RESET_ASSERT: Duration = Duration::from_millis(5);
const RESET_RELEASE: Duration = Duration::from_millis(10);
const POWER_SETTLE: Duration = Duration::from_millis(100);

/// Bring the chip up: pins, supply, reference clock, reset pulse.
///
/// Only a clock enable failure aborts; it restores the reset line and parks
/// the pins before returning.
pub async fn power_on(power: &dyn PowerControl) -> Result<(), PowerError> {
    if let Err(e) = power.select_pins(PinState::Default).await {
        tracing::warn!(error = %e, "could not select default pins");
    }

    if power.has_line(GpioLine::Power) {
        power.set_line(GpioLine::Power, true).await?;
        sleep(POWER_RAMP).await;
    }

    match power.set_clock_rate(XVCLK_FREQ).await {
        Ok(rate) if rate != XVCLK_FREQ => {
            tracing::warn!(requested = XVCLK_FREQ, actual = rate, "xvclk mismatched");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "failed to set xvclk rate"),
    }

    if let Err(e) = power.enable_clock().await {
        tracing::error!(error = %e, "failed to enable xvclk");
        if power.has_line(GpioLine::Reset) {
            let _ = power.set_line(GpioLine::Reset, true).await;
        }
        let _ = power.select_pins(PinState::Sleep).await;
        return Err(e);
    }

    if power.has_line(GpioLine::Reset) {
        power.set_line(GpioLine::Reset, false).await?;
        sleep(RESET_ASSERT).await;
        power.set_line(GpioLine::Reset, true).await?;
        sleep(RESET_RELEASE).await;
    }

    sleep(POWER_SETTLE).await;
    tracing::debug!("power on complete");
    Ok(())
}

/// Hold reset, stop the clock and park the pins. Best effort.
pub async fn power_off(power: &dyn PowerControl) {
    if power.has_line(GpioLine::Reset) {
        if let Err(e) = power.set_line(GpioLine::Reset, false).await {
            tracing::warn!(error = %e, "could not assert reset");
        }
    }
    power.disable_clock().await;
    if let Err(e) = power.select_pins(PinState::Sleep).await {
        tracing::debug!(error = %e, "could not set sleep pins");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcap_driver_mock::{MockPowerControl, PowerCall};

    #[tokio::test(start_paused = true)]
    async fn test_power_on_sequence() {
        let power = MockPowerControl::new();
        power_on(&power).await.unwrap();
        assert_eq!(
            power.calls(),
            vec![
                PowerCall::SelectPins(PinState::Default),
                PowerCall::SetLine(GpioLine::Power, true),
                PowerCall::SetClockRate(XVCLK_FREQ),
                PowerCall::EnableClock,
                PowerCall::SetLine(GpioLine::Reset, false),
                PowerCall::SetLine(GpioLine::Reset, true),
            ]
        );
        assert!(power.clock_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_failure_unwinds() {
        let power = MockPowerControl::new().with_failing_clock();
        assert!(power_on(&power).await.is_err());
        let calls = power.calls();
        assert_eq!(
            &calls[calls.len() - 2..],
            &[
                PowerCall::SetLine(GpioLine::Reset, true),
                PowerCall::SelectPins(PinState::Sleep),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_mismatch_is_not_fatal() {
        let power = MockPowerControl::new().with_clock_rate(24_000_000);
        assert!(power_on(&power).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_lines_are_skipped() {
        let power = MockPowerControl::new()
            .without_line(GpioLine::Power)
            .without_line(GpioLine::Reset)
            .without_pinctrl();
        power_on(&power).await.unwrap();
        assert_eq!(
            power.calls(),
            vec![PowerCall::SetClockRate(XVCLK_FREQ), PowerCall::EnableClock]
        );
    }

    #[tokio::test]
    async fn test_power_off_sequence() {
        let power = MockPowerControl::new();
        power_off(&power).await;
        assert_eq!(
            power.calls(),
            vec![
                PowerCall::SetLine(GpioLine::Reset, false),
                PowerCall::DisableClock,
                PowerCall::SelectPins(PinState::Sleep),
            ]
        );
    }
}
