//! XS9922 register map.
//!
//! Per-channel registers live in a 4 KiB window selected by the high nibble
//! of the address: channel `n` starts at `n << 12`.

use vcap_core::RegVal;

/// Sensor name reported in module info.
pub const CHIP_NAME: &str = "xs9922";
/// Analog input channels.
pub const NUM_CHANNELS: u8 = 4;

/// Reference clock fed to the chip.
pub const XVCLK_FREQ: u64 = 27_000_000;

/// Chip id, high byte.
pub const CHIP_ID_HIGH_REG: u16 = 0x40f0;
/// Chip id, low byte.
pub const CHIP_ID_LOW_REG: u16 = 0x40f1;
/// Expected chip id.
pub const CHIP_ID: u16 = 0x9922;

/// Status bit 4 is cleared while the channel sees a video signal.
pub const VIDEO_LOSS_BIT: u8 = 1 << 4;

/// Start of the register window of `ch`.
pub const fn channel_base(ch: u8) -> u16 {
    (ch as u16) << 12
}

/// Video status register of `ch`.
pub const fn video_status_reg(ch: u8) -> u16 {
    channel_base(ch)
}

/// Per-channel CSI-2 output enable.
pub const fn output_enable_reg(ch: u8) -> u16 {
    channel_base(ch) | 0x0e08
}

// Picture adjustment offsets within a channel window.

/// Contrast, unsigned.
pub const CONTRAST_REG: u16 = 0x106;
/// Brightness, signed.
pub const BRIGHTNESS_REG: u16 = 0x107;
/// Saturation, unsigned.
pub const SATURATION_REG: u16 = 0x108;
/// Hue, signed.
pub const HUE_REG: u16 = 0x109;

/// MIPI output logic reset: clear all four control registers, then release.
pub const MIPI_RESET: [RegVal; 8] = [
    RegVal::new(0x5004, 0x00),
    RegVal::new(0x5005, 0x00),
    RegVal::new(0x5006, 0x00),
    RegVal::new(0x5007, 0x00),
    RegVal::new(0x5004, 0x00),
    RegVal::new(0x5005, 0x00),
    RegVal::new(0x5006, 0x00),
    RegVal::new(0x5007, 0x01),
];

/// MIPI output logic held in reset.
pub const MIPI_TEARDOWN: [RegVal; 4] = [
    RegVal::new(0x5004, 0x00),
    RegVal::new(0x5005, 0x00),
    RegVal::new(0x5006, 0x00),
    RegVal::new(0x5007, 0x00),
];

/// Release only, used by quick stream on.
pub const MIPI_QUICK_RELEASE: [RegVal; 2] = [
    RegVal::new(0x5006, 0x00),
    RegVal::new(0x5007, 0x01),
];

/// Registers captured by the diagnostic dump, relative to each channel base.
pub const DIAG_RANGES: [std::ops::RangeInclusive<u16>; 2] = [0x00..=0x29, 0x100..=0x1e2];

/// Common bring-up program applied before any mode program.
pub const GLOBAL_INIT: &[RegVal] = &[
    RegVal::new(0x0803, 0x03),
    RegVal::new(0x080b, 0x00),
    RegVal::with_delay(0x0804, 0x01, 10),
    RegVal::new(0x0804, 0x00),
    RegVal::new(0x4010, 0x03),
    RegVal::new(0x4011, 0x00),
    RegVal::new(0x50e0, 0x00),
    RegVal::new(0x50e1, 0x00),
    RegVal::new(0x50e2, 0x00),
    RegVal::new(0x50e3, 0x07),
];

/// 1920x1080 progressive, 25 fps.
pub const MODE_1080P25: &[RegVal] = &[
    RegVal::new(0x0100, 0x02),
    RegVal::new(0x1100, 0x02),
    RegVal::new(0x2100, 0x02),
    RegVal::new(0x3100, 0x02),
    RegVal::new(0x5000, 0x0f),
    RegVal::new(0x5003, 0x00),
];

/// 1280x720 progressive, 25 fps.
pub const MODE_720P25: &[RegVal] = &[
    RegVal::new(0x0100, 0x01),
    RegVal::new(0x1100, 0x01),
    RegVal::new(0x2100, 0x01),
    RegVal::new(0x3100, 0x01),
    RegVal::new(0x5000, 0x0f),
    RegVal::new(0x5003, 0x01),
];

/// 720x576 interlaced, 25 fps.
pub const MODE_PAL: &[RegVal] = &[
    RegVal::new(0x0100, 0x10),
    RegVal::new(0x1100, 0x10),
    RegVal::new(0x2100, 0x10),
    RegVal::new(0x3100, 0x10),
    RegVal::new(0x5000, 0x0f),
    RegVal::new(0x5003, 0x02),
];

/// 720x480 interlaced, 30 fps.
pub const MODE_NTSC: &[RegVal] = &[
    RegVal::new(0x0100, 0x11),
    RegVal::new(0x1100, 0x11),
    RegVal::new(0x2100, 0x11),
    RegVal::new(0x3100, 0x11),
    RegVal::new(0x5000, 0x0f),
    RegVal::new(0x5003, 0x03),
];

/// Output enable (or disable) program for all channels.
pub fn output_enable(on: bool) -> [RegVal; NUM_CHANNELS as usize] {
    let val = u8::from(on);
    [0u8, 1, 2, 3].map(|ch| RegVal::new(output_enable_reg(ch), val))
}
