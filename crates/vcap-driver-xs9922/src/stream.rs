//! Register programs for mode switching and streaming.
//!
//! Every function here runs its whole program and reports failures in the
//! returned [`WriteReport`]; none of them stop early. State bookkeeping
//! (streaming flag, whether the mode program is current) belongs to the
//! caller, which holds the device lock across the call.

use crate::modes::VideoMode;
use crate::regs;
use std::time::Duration;
use vcap_core::{RegisterBus, WriteReport};

/// Global init program followed by the mode program.
pub async fn program_mode(bus: &dyn RegisterBus, mode: &VideoMode) -> WriteReport {
    tracing::debug!(mode = %mode.label(), "programming mode");
    let mut report = bus.write_sequence(mode.global_regs).await;
    report.merge(bus.write_sequence(mode.mode_regs).await);
    report
}

/// Clear then release the MIPI output logic.
pub async fn mipi_reset(bus: &dyn RegisterBus) -> WriteReport {
    bus.write_sequence(&regs::MIPI_RESET).await
}

/// Enable or disable the four channel outputs.
pub async fn set_outputs(bus: &dyn RegisterBus, on: bool) -> WriteReport {
    bus.write_sequence(&regs::output_enable(on)).await
}

/// Full stream start. Reprograms `mode` first when `reprogram` is set.
pub async fn start(
    bus: &dyn RegisterBus,
    mode: &VideoMode,
    reprogram: bool,
    settle: Duration,
) -> WriteReport {
    let mut report = WriteReport::new();
    if reprogram {
        report.merge(program_mode(bus, mode).await);
    }
    report.merge(mipi_reset(bus).await);
    report.merge(set_outputs(bus, true).await);
    tokio::time::sleep(settle).await;
    report
}

/// Full stream stop.
pub async fn stop(bus: &dyn RegisterBus) -> WriteReport {
    set_outputs(bus, false).await
}

/// Fast restart without reprogramming or settling.
pub async fn quick_start(bus: &dyn RegisterBus) -> WriteReport {
    let mut report = bus.write_sequence(&regs::MIPI_QUICK_RELEASE).await;
    report.merge(set_outputs(bus, true).await);
    report
}

/// Disable outputs and leave the MIPI logic held in reset.
pub async fn quick_stop(bus: &dyn RegisterBus) -> WriteReport {
    let mut report = set_outputs(bus, false).await;
    report.merge(bus.write_sequence(&regs::MIPI_TEARDOWN).await);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::MODES;
    use vcap_driver_mock::{FaultCount, MockRegisterBus};

    #[tokio::test(start_paused = true)]
    async fn test_start_without_reprogram() {
        let bus = MockRegisterBus::new();
        let report = start(&bus, &MODES[0], false, Duration::from_millis(300)).await;
        assert!(report.is_ok());
        let writes = bus.writes();
        assert_eq!(writes.len(), regs::MIPI_RESET.len() + 4);
        assert_eq!(writes[7], (0x5007, 0x01));
        assert_eq!(&writes[8..], &[(0x0e08, 1), (0x1e08, 1), (0x2e08, 1), (0x3e08, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_waits_for_settle() {
        let bus = MockRegisterBus::new();
        let t0 = tokio::time::Instant::now();
        start(&bus, &MODES[1], true, Duration::from_millis(300)).await;
        assert!(t0.elapsed() >= Duration::from_millis(300));
        let expected = MODES[1].global_regs.len() + MODES[1].mode_regs.len() + 8 + 4;
        assert_eq!(bus.writes().len(), expected);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_sequence() {
        let bus = MockRegisterBus::new();
        bus.fail_writes(0x1e08, FaultCount::Always);
        let report = quick_start(&bus).await;
        assert_eq!(report.attempted(), 6);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(bus.register(0x3e08), 1);
    }

    #[tokio::test]
    async fn test_quick_stop_tears_down_mipi() {
        let bus = MockRegisterBus::new();
        quick_stop(&bus).await;
        assert_eq!(
            bus.writes(),
            vec![
                (0x0e08, 0),
                (0x1e08, 0),
                (0x2e08, 0),
                (0x3e08, 0),
                (0x5004, 0),
                (0x5005, 0),
                (0x5006, 0),
                (0x5007, 0),
            ]
        );
    }
}
