//! Request surface of the device.
//!
//! Every query or control a capture pipeline issues is available both as a
//! typed method on [`Xs9922`] and as a [`Request`] for callers that route
//! commands generically (CLI, RPC). [`Xs9922::handle_request`] maps one onto
//! the other.

use crate::controls::PictureControl;
use crate::device::Xs9922;
use crate::error::Xs9922Error;
use crate::modes::{BusFormat, Fraction, ScanField, VideoMode};
use serde::{Deserialize, Serialize};

/// Source pads, one per input channel.
pub const PADS: usize = 4;

/// Whether a format request touches hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatWhich {
    /// Apply to the device.
    Active,
    /// Negotiate only; stored per pad.
    Try,
}

/// A `set_format` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRequest {
    /// Target pad; out-of-range pads act on pad 0.
    pub pad: u32,
    /// Active or try.
    pub which: FormatWhich,
    /// Requested width; the closest mode wins.
    pub width: u32,
    /// Requested height.
    pub height: u32,
    /// Requested bus format.
    pub code: BusFormat,
}

impl FormatRequest {
    /// Active request on pad 0.
    pub fn active(width: u32, height: u32, code: BusFormat) -> Self {
        Self {
            pad: 0,
            which: FormatWhich::Active,
            width,
            height,
            code,
        }
    }

    /// Try request on `pad`.
    pub fn try_on(pad: u32, width: u32, height: u32, code: BusFormat) -> Self {
        Self {
            pad,
            which: FormatWhich::Try,
            width,
            height,
            code,
        }
    }
}

/// Frame format reported on a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadFormat {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in lines.
    pub height: u32,
    /// Media bus code.
    pub code: BusFormat,
    /// Scan type.
    pub field: ScanField,
    /// CSI-2 virtual channel carrying this pad.
    pub vc: u8,
}

impl PadFormat {
    /// Format `mode` produces on `pad`.
    pub fn from_mode(mode: &VideoMode, pad: usize) -> Self {
        Self {
            width: mode.width,
            height: mode.height,
            code: mode.bus_format,
            field: mode.field,
            vc: mode.vc.get(pad).copied().unwrap_or(mode.vc[0]),
        }
    }
}

/// Clamp a pad number to a valid index; out-of-range pads report pad 0.
pub fn pad_index(pad: u32) -> usize {
    let pad = pad as usize;
    if pad < PADS {
        pad
    } else {
        0
    }
}

/// Board-level identity of the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Chip name.
    pub sensor: String,
    /// Configured module name.
    pub module: String,
    /// Configured lens name.
    pub lens: String,
    /// Module index on the board.
    pub index: u32,
    /// Module facing, e.g. `back`.
    pub facing: String,
}

/// Cause of a pending receiver reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    /// A channel was plugged or unplugged.
    Hotplug,
}

/// Reset request reported to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetInfo {
    /// Set after a confirmed hotplug change until acknowledged.
    pub needs_reset: bool,
    /// Why the reset is needed.
    pub reason: ResetReason,
}

/// Whether the receiver should start this device before or after itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartStreamSeq {
    /// Start this device before the receiver.
    Front,
}

/// Physical bus of the output link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusType {
    /// MIPI CSI-2 over D-PHY.
    Csi2Dphy,
}

/// Output link description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MbusConfig {
    /// Bus type.
    pub bus_type: BusType,
    /// Data lane count.
    pub lanes: u32,
    /// Bitmask of virtual channels in use.
    pub channels: u8,
}

/// Frame size of one mode; min and max are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSizeRange {
    /// Smallest width.
    pub min_width: u32,
    /// Largest width.
    pub max_width: u32,
    /// Smallest height.
    pub min_height: u32,
    /// Largest height.
    pub max_height: u32,
}

/// One enumerated frame interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameIntervalDesc {
    /// Bus format of the mode.
    pub code: BusFormat,
    /// Mode width.
    pub width: u32,
    /// Mode height.
    pub height: u32,
    /// Frame interval.
    pub interval: Fraction,
}

/// Generic form of every device operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// [`Xs9922::module_info`].
    GetModuleInfo,
    /// [`Xs9922::hotplug_info`].
    GetHotplugInfo,
    /// [`Xs9922::reset_info`].
    GetResetInfo,
    /// Store the reset-required flag; `false` acknowledges a reset.
    SetResetInfo(bool),
    /// [`Xs9922::set_format`].
    SetFormat(FormatRequest),
    /// [`Xs9922::get_format`].
    GetFormat {
        /// Pad to query.
        pad: u32,
        /// Active or per-pad try format.
        which: FormatWhich,
    },
    /// [`Xs9922::set_stream`].
    SetStream(bool),
    /// [`Xs9922::quick_stream`].
    QuickStream(bool),
    /// [`Xs9922::set_power`].
    SetPower(bool),
    /// [`Xs9922::start_stream_sequence`].
    GetStartStreamSeq,
    /// [`Xs9922::get_control`].
    GetControl(PictureControl),
    /// [`Xs9922::set_control`].
    SetControl(PictureControl, i64),
    /// [`Xs9922::enum_mbus_code`].
    EnumMbusCode(u32),
    /// [`Xs9922::enum_frame_size`].
    EnumFrameSize {
        /// Mode table index.
        index: u32,
        /// Bus format the caller expects.
        code: BusFormat,
    },
    /// [`Xs9922::enum_frame_interval`].
    EnumFrameInterval(u32),
    /// [`Xs9922::frame_interval`].
    GetFrameInterval,
    /// [`Xs9922::mbus_config`].
    GetMbusConfig,
}

/// Result of a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Operation applied, nothing to report.
    Ok,
    /// Module identity.
    ModuleInfo(ModuleInfo),
    /// Raw hotplug bitmap.
    Hotplug(u8),
    /// Reset request state.
    ResetInfo(ResetInfo),
    /// Pad format.
    Format(PadFormat),
    /// Start ordering.
    StartStreamSeq(StartStreamSeq),
    /// Control value.
    Control(i64),
    /// Enumerated bus format.
    MbusCode(BusFormat),
    /// Enumerated frame size.
    FrameSize(FrameSizeRange),
    /// Enumerated frame interval.
    FrameInterval(FrameIntervalDesc),
    /// Current frame interval.
    Interval(Fraction),
    /// Output link description.
    MbusConfig(MbusConfig),
}

impl Xs9922 {
    /// Dispatch a [`Request`] to the matching operation.
    pub async fn handle_request(&self, request: Request) -> Result<Response, Xs9922Error> {
        match request {
            Request::GetModuleInfo => Ok(Response::ModuleInfo(self.module_info())),
            Request::GetHotplugInfo => Ok(Response::Hotplug(self.hotplug_info())),
            Request::GetResetInfo => Ok(Response::ResetInfo(self.reset_info())),
            Request::SetResetInfo(needs_reset) => {
                self.set_reset_info(needs_reset);
                Ok(Response::Ok)
            }
            Request::SetFormat(req) => self.set_format(req).await.map(Response::Format),
            Request::GetFormat { pad, which } => {
                Ok(Response::Format(self.get_format(pad, which).await))
            }
            Request::SetStream(on) => self.set_stream(on).await.map(|_| Response::Ok),
            Request::QuickStream(on) => self.quick_stream(on).await.map(|_| Response::Ok),
            Request::SetPower(on) => self.set_power(on).await.map(|_| Response::Ok),
            Request::GetStartStreamSeq => {
                Ok(Response::StartStreamSeq(self.start_stream_sequence()))
            }
            Request::GetControl(control) => self.get_control(control).await.map(Response::Control),
            Request::SetControl(control, value) => self
                .set_control(control, value)
                .await
                .map(|_| Response::Ok),
            Request::EnumMbusCode(index) => self.enum_mbus_code(index).map(Response::MbusCode),
            Request::EnumFrameSize { index, code } => {
                self.enum_frame_size(index, code).map(Response::FrameSize)
            }
            Request::EnumFrameInterval(index) => self
                .enum_frame_interval(index)
                .map(Response::FrameInterval),
            Request::GetFrameInterval => Ok(Response::Interval(self.frame_interval().await)),
            Request::GetMbusConfig => Ok(Response::MbusConfig(self.mbus_config())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::MODES;

    #[test]
    fn test_pad_format_carries_vc() {
        let fmt = PadFormat::from_mode(&MODES[2], 3);
        assert_eq!(fmt.vc, 3);
        assert_eq!(fmt.field, ScanField::Interlaced);
        assert_eq!((fmt.width, fmt.height), (720, 576));
    }

    #[test]
    fn test_pad_index_falls_back_to_zero() {
        assert_eq!(pad_index(2), 2);
        assert_eq!(pad_index(4), 0);
        assert_eq!(pad_index(u32::MAX), 0);
    }
}
