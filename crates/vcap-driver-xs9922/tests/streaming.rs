//! Format selection, stream sequencing and power state.
//!
//! | Test | Description |
//! |------|-------------|
//! | `test_exact_format_updates_rates` | active format picks the exact mode and republishes rates |
//! | `test_stream_on_is_idempotent` | a repeated start issues no second sequence |
//! | `test_stream_reprograms_when_output_deferred` | deferred programming lands at stream start |
//! | `test_stream_on_powers_up` | starting an unpowered device powers it first |
//! | `test_quick_stream_sequences` | quick on/off register programs |
//! | `test_write_failure_surfaces_after_full_program` | failed writes do not stop a sequence |
//! | `test_probe_chip_id_mismatch` | wrong chip id fails probe and powers down |
//! | `test_status_surface` | text read and command handling |

mod common;

use common::{chip_bus, rig, rig_with, PRESENT};
use std::sync::Arc;
use vcap_core::{GpioLine, VcapError};
use vcap_driver_mock::{FaultCount, MockPowerControl, PowerCall};
use vcap_driver_xs9922::regs;
use vcap_driver_xs9922::request::StartStreamSeq;
use vcap_driver_xs9922::{
    BusFormat, CommandOutput, FormatRequest, FormatWhich, Request, Response, Xs9922, Xs9922Config,
    Xs9922Error, MODES,
};

fn start_writes() -> Vec<(u16, u8)> {
    regs::MIPI_RESET
        .iter()
        .chain(regs::output_enable(true).iter())
        .map(|r| (r.addr, r.val))
        .collect()
}

fn program_writes(index: usize) -> Vec<(u16, u8)> {
    MODES[index]
        .global_regs
        .iter()
        .chain(MODES[index].mode_regs)
        .map(|r| (r.addr, r.val))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_exact_format_updates_rates() {
    let config = Xs9922Config {
        default_mode: "1280x720".into(),
        ..Default::default()
    };
    let r = rig_with(config, PRESENT).await;
    assert_eq!(r.dev.current_mode().await.index(), 1);
    let mut rate = r.dev.controls().pixel_rate.subscribe();
    r.bus.clear_log();

    let fmt = r
        .dev
        .set_format(FormatRequest::active(1920, 1080, BusFormat::Uyvy8_2x8))
        .await
        .unwrap();

    assert_eq!((fmt.width, fmt.height), (1920, 1080));
    assert_eq!(r.dev.current_mode().await.index(), 0);
    assert!(rate.has_changed().unwrap());
    assert_eq!(*rate.borrow_and_update(), MODES[0].pixel_rate());

    let mut expected = program_writes(0);
    expected.extend(regs::MIPI_RESET.iter().map(|r| (r.addr, r.val)));
    assert_eq!(r.bus.writes(), expected);
    r.dev.remove().await;
}

#[tokio::test(start_paused = true)]
async fn test_closest_format_and_errors() {
    let r = rig(PRESENT).await;
    let fmt = r
        .dev
        .set_format(FormatRequest::active(700, 500, BusFormat::Uyvy8_2x8))
        .await
        .unwrap();
    assert_eq!((fmt.width, fmt.height), (720, 480));

    let err = r
        .dev
        .set_format(FormatRequest::active(1920, 1080, BusFormat::Yuyv8_2x8))
        .await
        .unwrap_err();
    assert!(matches!(err, Xs9922Error::NoMatchingMode { .. }));
    assert_eq!(r.dev.current_mode().await.index(), 3);
    r.dev.remove().await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_on_is_idempotent() {
    let r = rig(PRESENT).await;
    r.bus.clear_log();

    r.dev.set_stream(true).await.unwrap();
    r.dev.set_stream(true).await.unwrap();
    assert_eq!(r.bus.writes(), start_writes());
    assert!(r.dev.is_streaming().await);

    r.bus.clear_log();
    r.dev.set_stream(false).await.unwrap();
    r.dev.set_stream(false).await.unwrap();
    let off: Vec<_> = regs::output_enable(false).iter().map(|r| (r.addr, r.val)).collect();
    assert_eq!(r.bus.writes(), off);
    r.dev.remove().await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_reprograms_when_output_deferred() {
    let config = Xs9922Config {
        sensor_output_disabled: true,
        ..Default::default()
    };
    let r = rig_with(config, PRESENT).await;
    assert!(r.bus.writes().is_empty());

    r.dev
        .set_format(FormatRequest::active(1280, 720, BusFormat::Uyvy8_2x8))
        .await
        .unwrap();
    r.bus.clear_log();
    r.dev.set_stream(true).await.unwrap();

    let mut expected = program_writes(1);
    expected.extend(start_writes());
    assert_eq!(r.bus.writes(), expected);
    r.dev.remove().await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_on_powers_up() {
    let r = rig(PRESENT).await;
    r.dev.set_power(false).await.unwrap();
    assert!(!r.power.clock_enabled());
    r.bus.clear_log();

    r.dev.set_stream(true).await.unwrap();
    assert!(r.dev.is_powered().await);
    assert!(r.power.clock_enabled());
    // Power-off lost the program, so stream start reapplies it.
    let mut expected = program_writes(0);
    expected.extend(start_writes());
    assert_eq!(r.bus.writes(), expected);
    r.dev.remove().await;
}

#[tokio::test(start_paused = true)]
async fn test_set_power_is_idempotent() {
    let r = rig(PRESENT).await;
    r.power.clear_calls();
    r.dev.set_power(true).await.unwrap();
    assert!(r.power.calls().is_empty());

    r.dev.set_power(false).await.unwrap();
    r.dev.set_power(false).await.unwrap();
    let disables = r
        .power
        .calls()
        .into_iter()
        .filter(|c| *c == PowerCall::DisableClock)
        .count();
    assert_eq!(disables, 1);
    r.dev.remove().await;
}

#[tokio::test(start_paused = true)]
async fn test_quick_stream_sequences() {
    let r = rig(PRESENT).await;
    r.bus.clear_log();
    r.dev.quick_stream(true).await.unwrap();
    let mut expected: Vec<_> = regs::MIPI_QUICK_RELEASE.iter().map(|r| (r.addr, r.val)).collect();
    expected.extend(regs::output_enable(true).iter().map(|r| (r.addr, r.val)));
    assert_eq!(r.bus.writes(), expected);

    r.bus.clear_log();
    r.dev.quick_stream(false).await.unwrap();
    let mut expected: Vec<_> = regs::output_enable(false).iter().map(|r| (r.addr, r.val)).collect();
    expected.extend(regs::MIPI_TEARDOWN.iter().map(|r| (r.addr, r.val)));
    assert_eq!(r.bus.writes(), expected);
    r.dev.remove().await;
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_surfaces_after_full_program() {
    let r = rig(PRESENT).await;
    r.bus.fail_writes(regs::output_enable_reg(1), FaultCount::Times(1));
    r.bus.clear_log();

    let err = r.dev.set_stream(true).await.unwrap_err();
    assert!(matches!(err, Xs9922Error::Sequence(_)));
    // Remaining writes still went out and the state still advanced.
    assert_eq!(r.bus.register(regs::output_enable_reg(3)), 1);
    assert!(r.dev.is_streaming().await);

    let vcap: VcapError = err.into();
    assert!(matches!(vcap, VcapError::Sequence(_)));
    r.dev.remove().await;
}

#[tokio::test(start_paused = true)]
async fn test_probe_chip_id_mismatch() {
    let bus = chip_bus(PRESENT);
    bus.set_register(regs::CHIP_ID_LOW_REG, 0x21);
    let power = Arc::new(MockPowerControl::new());

    let err = Xs9922::probe(Xs9922Config::default(), bus.clone(), power.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Xs9922Error::ChipIdMismatch {
            expected: 0x9922,
            found: 0x9921
        }
    ));
    assert!(!power.clock_enabled());
    assert_eq!(power.line_level(GpioLine::Reset), Some(false));
    assert!(bus.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_probe_rejects_bad_config() {
    let bus = chip_bus(PRESENT);
    let power = Arc::new(MockPowerControl::new());
    let config = Xs9922Config {
        module_name: String::new(),
        ..Default::default()
    };
    let err = Xs9922::probe(config, bus, power.clone()).await.unwrap_err();
    assert!(matches!(err, Xs9922Error::MissingProperty("module_name")));
    assert!(power.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_request_dispatch() {
    let r = rig(PRESENT).await;

    match r.dev.handle_request(Request::GetModuleInfo).await.unwrap() {
        Response::ModuleInfo(info) => {
            assert_eq!(info.sensor, "xs9922");
            assert_eq!(info.facing, "back");
        }
        other => panic!("unexpected response {:?}", other),
    }

    let fmt = r
        .dev
        .handle_request(Request::GetFormat {
            pad: 1,
            which: FormatWhich::Active,
        })
        .await
        .unwrap();
    assert!(matches!(fmt, Response::Format(f) if f.vc == 1 && f.width == 1920));

    assert_eq!(
        r.dev.handle_request(Request::GetHotplugInfo).await.unwrap(),
        Response::Hotplug(0b1111)
    );
    assert_eq!(
        r.dev.handle_request(Request::GetStartStreamSeq).await.unwrap(),
        Response::StartStreamSeq(StartStreamSeq::Front)
    );
    assert!(r
        .dev
        .handle_request(Request::EnumMbusCode(7))
        .await
        .is_err());
    r.dev.remove().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_surface() {
    let r = rig(PRESENT).await;
    assert_eq!(r.dev.hotplug_status(), "15\n");

    assert_eq!(r.dev.store_command("0").await.unwrap(), CommandOutput::Done);
    assert_eq!(r.power.line_level(GpioLine::Camera), Some(false));
    r.dev.store_command("1\n").await.unwrap();
    assert_eq!(r.power.line_level(GpioLine::Camera), Some(true));

    match r.dev.store_command("2").await.unwrap() {
        CommandOutput::Dump(dumps) => {
            assert_eq!(dumps.len(), 4);
            assert_eq!(dumps[2].registers[0].0, 0x2000);
            assert_eq!(dumps[0].registers.len(), 0x2a + 0xe3);
        }
        other => panic!("unexpected output {:?}", other),
    }

    assert!(matches!(
        r.dev.store_command("9").await,
        Err(Xs9922Error::InvalidCommand(_))
    ));
    r.dev.remove().await;
}
