//! Supported output modes and best-fit selection.

use crate::error::Xs9922Error;
use crate::regs;
use serde::{Deserialize, Serialize};
use vcap_core::RegVal;

/// CSI-2 lanes driven by the chip.
pub const LANES: u32 = 4;

/// Selectable MIPI link frequencies in Hz, indexed by [`VideoMode::link_freq_idx`].
pub const LINK_FREQS: [i64; 3] = [750_000_000, 600_000_000, 297_000_000];

/// Media bus pixel formats known to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusFormat {
    /// 8-bit UYVY, two samples per pixel.
    Uyvy8_2x8,
    /// 8-bit YUYV, two samples per pixel.
    Yuyv8_2x8,
}

impl BusFormat {
    /// Numeric media bus code.
    pub const fn code(self) -> u32 {
        match self {
            BusFormat::Uyvy8_2x8 => 0x2006,
            BusFormat::Yuyv8_2x8 => 0x2008,
        }
    }
}

impl std::fmt::Display for BusFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BusFormat::Uyvy8_2x8 => "UYVY8_2X8",
            BusFormat::Yuyv8_2x8 => "YUYV8_2X8",
        };
        write!(f, "{}", name)
    }
}

/// Field order of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanField {
    /// Full frames.
    Progressive,
    /// Alternating fields.
    Interlaced,
}

/// Rational frame interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fraction {
    /// Seconds numerator.
    pub numerator: u32,
    /// Seconds denominator.
    pub denominator: u32,
}

impl Fraction {
    /// `numerator / denominator` seconds.
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Frames per second for a frame interval.
    pub fn fps(&self) -> f64 {
        if self.numerator == 0 {
            return 0.0;
        }
        f64::from(self.denominator) / f64::from(self.numerator)
    }
}

/// One entry of the mode table.
#[derive(Debug, PartialEq, Eq)]
pub struct VideoMode {
    /// Pixel format on the CSI-2 link.
    pub bus_format: BusFormat,
    /// Active width in pixels.
    pub width: u32,
    /// Active height in lines.
    pub height: u32,
    /// Shortest frame interval.
    pub max_fps: Fraction,
    /// Progressive or interlaced.
    pub field: ScanField,
    /// Index into [`LINK_FREQS`].
    pub link_freq_idx: usize,
    /// Bits per pixel sample on the link.
    pub bpp: u32,
    /// CSI-2 data lanes.
    pub lanes: u32,
    /// Bring-up program applied before `mode_regs`.
    pub global_regs: &'static [RegVal],
    /// Mode-specific program.
    pub mode_regs: &'static [RegVal],
    /// Virtual channel carried on each source pad.
    pub vc: [u8; 4],
}

impl VideoMode {
    /// Pixel rate derived from the link frequency.
    pub fn pixel_rate(&self) -> i64 {
        self.link_freq() / i64::from(self.bpp) * 2 * i64::from(self.lanes)
    }

    /// Link frequency in Hz.
    pub fn link_freq(&self) -> i64 {
        LINK_FREQS.get(self.link_freq_idx).copied().unwrap_or(LINK_FREQS[0])
    }

    /// Index of this mode in [`MODES`].
    pub fn index(&self) -> usize {
        MODES
            .iter()
            .position(|m| std::ptr::eq(m, self))
            .unwrap_or_default()
    }

    /// Short label such as `1920x1080`.
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Mode table. Order matters: ties in [`find_best_fit`] go to the lower index.
pub static MODES: [VideoMode; 4] = [
    VideoMode {
        bus_format: BusFormat::Uyvy8_2x8,
        width: 1920,
        height: 1080,
        max_fps: Fraction::new(10000, 250000),
        field: ScanField::Progressive,
        link_freq_idx: 0,
        bpp: 8,
        lanes: LANES,
        global_regs: regs::GLOBAL_INIT,
        mode_regs: regs::MODE_1080P25,
        vc: [0, 1, 2, 3],
    },
    VideoMode {
        bus_format: BusFormat::Uyvy8_2x8,
        width: 1280,
        height: 720,
        max_fps: Fraction::new(10000, 250000),
        field: ScanField::Progressive,
        link_freq_idx: 0,
        bpp: 8,
        lanes: LANES,
        global_regs: regs::GLOBAL_INIT,
        mode_regs: regs::MODE_720P25,
        vc: [0, 1, 2, 3],
    },
    VideoMode {
        bus_format: BusFormat::Uyvy8_2x8,
        width: 720,
        height: 576,
        max_fps: Fraction::new(10000, 250000),
        field: ScanField::Interlaced,
        link_freq_idx: 0,
        bpp: 8,
        lanes: LANES,
        global_regs: regs::GLOBAL_INIT,
        mode_regs: regs::MODE_PAL,
        vc: [0, 1, 2, 3],
    },
    VideoMode {
        bus_format: BusFormat::Uyvy8_2x8,
        width: 720,
        height: 480,
        max_fps: Fraction::new(10000, 300000),
        field: ScanField::Interlaced,
        link_freq_idx: 0,
        bpp: 8,
        lanes: LANES,
        global_regs: regs::GLOBAL_INIT,
        mode_regs: regs::MODE_NTSC,
        vc: [0, 1, 2, 3],
    },
];

/// Pick the mode closest to `width`x`height` among those producing
/// `format`. Distance is `|dw| + |dh|`; the first entry wins a tie.
pub fn find_best_fit(
    width: u32,
    height: u32,
    format: BusFormat,
) -> Result<&'static VideoMode, Xs9922Error> {
    MODES
        .iter()
        .filter(|m| m.bus_format == format)
        .min_by_key(|m| m.width.abs_diff(width) + m.height.abs_diff(height))
        .ok_or(Xs9922Error::NoMatchingMode { format })
}

/// Resolve a `"WIDTHxHEIGHT"` label against the table.
pub fn find_by_label(label: &str) -> Option<&'static VideoMode> {
    let (w, h) = label.trim().split_once(['x', 'X'])?;
    let width: u32 = w.trim().parse().ok()?;
    let height: u32 = h.trim().parse().ok()?;
    MODES.iter().find(|m| m.width == width && m.height == height)
}
