//! User-visible controls.
//!
//! Picture adjustments are written to every channel and read back from
//! channel 0. Brightness and hue are signed on the chip (`-128..=127`) but
//! exposed as `0..=255` with `0x80` meaning neutral.

use crate::error::Xs9922Error;
use crate::modes::{VideoMode, LINK_FREQS};
use crate::regs::{self, NUM_CHANNELS};
use serde::{Deserialize, Serialize};
use vcap_core::{Observable, RegVal, RegisterBus, TransportError, WriteReport};

/// Neutral value of every picture control.
pub const PICTURE_DEFAULT: i64 = 0x80;

/// Picture adjustment applied to all channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PictureControl {
    /// Luma offset, signed on the chip.
    Brightness,
    /// Luma gain.
    Contrast,
    /// Chroma gain.
    Saturation,
    /// Chroma phase, signed on the chip.
    Hue,
}

impl PictureControl {
    /// Every picture control, in register order of the user interface.
    pub const ALL: [PictureControl; 4] = [
        PictureControl::Brightness,
        PictureControl::Contrast,
        PictureControl::Saturation,
        PictureControl::Hue,
    ];

    /// Register offset within a channel window.
    pub const fn reg(self) -> u16 {
        match self {
            PictureControl::Contrast => regs::CONTRAST_REG,
            PictureControl::Brightness => regs::BRIGHTNESS_REG,
            PictureControl::Saturation => regs::SATURATION_REG,
            PictureControl::Hue => regs::HUE_REG,
        }
    }

    /// Control name used in logs and on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            PictureControl::Brightness => "brightness",
            PictureControl::Contrast => "contrast",
            PictureControl::Saturation => "saturation",
            PictureControl::Hue => "hue",
        }
    }

    const fn is_signed(self) -> bool {
        matches!(self, PictureControl::Brightness | PictureControl::Hue)
    }

    /// Register byte for a user value in `0..=255`.
    pub fn encode(self, value: i64) -> u8 {
        let value = value.clamp(0, 255);
        if self.is_signed() {
            // -128..=127 stored as two's complement
            ((value - 128) as i8) as u8
        } else {
            value as u8
        }
    }

    /// User value for a register byte.
    pub fn decode(self, raw: u8) -> i64 {
        if self.is_signed() {
            i64::from(raw as i8) + 128
        } else {
            i64::from(raw)
        }
    }
}

impl std::str::FromStr for PictureControl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PictureControl::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown control '{}'", s))
    }
}

/// Control set of one device.
#[derive(Debug, Clone)]
pub struct Controls {
    /// See [`PictureControl::Brightness`].
    pub brightness: Observable,
    /// See [`PictureControl::Contrast`].
    pub contrast: Observable,
    /// See [`PictureControl::Saturation`].
    pub saturation: Observable,
    /// See [`PictureControl::Hue`].
    pub hue: Observable,
    /// Index into [`LINK_FREQS`].
    pub link_freq: Observable,
    /// Pixel rate of the current mode, in Hz.
    pub pixel_rate: Observable,
}

impl Controls {
    /// Defaults for every picture control and the rates of `mode`.
    pub fn new(mode: &VideoMode) -> Self {
        let picture = |c: PictureControl| {
            Observable::new(c.name(), PICTURE_DEFAULT).with_range(0, 255)
        };
        Self {
            brightness: picture(PictureControl::Brightness),
            contrast: picture(PictureControl::Contrast),
            saturation: picture(PictureControl::Saturation),
            hue: picture(PictureControl::Hue),
            link_freq: Observable::new("link_freq", mode.link_freq_idx as i64)
                .with_range(0, LINK_FREQS.len() as i64 - 1)
                .read_only(),
            pixel_rate: Observable::new("pixel_rate", mode.pixel_rate())
                .with_units("Hz")
                .read_only(),
        }
    }

    /// Observable backing `control`.
    pub fn picture(&self, control: PictureControl) -> &Observable {
        match control {
            PictureControl::Brightness => &self.brightness,
            PictureControl::Contrast => &self.contrast,
            PictureControl::Saturation => &self.saturation,
            PictureControl::Hue => &self.hue,
        }
    }

    /// Republish link frequency and pixel rate for `mode`.
    pub fn publish_mode(&self, mode: &VideoMode) {
        self.link_freq.publish(mode.link_freq_idx as i64);
        self.pixel_rate.publish(mode.pixel_rate());
        tracing::debug!(
            link_freq_idx = mode.link_freq_idx,
            pixel_rate = mode.pixel_rate(),
            "controls updated for mode"
        );
    }

    /// Validate, store and write a picture control to all channels.
    pub async fn set_picture(
        &self,
        bus: &dyn RegisterBus,
        control: PictureControl,
        value: i64,
    ) -> Result<WriteReport, Xs9922Error> {
        let obs = self.picture(control);
        obs.validate(value).map_err(Xs9922Error::Control)?;
        let raw = control.encode(value);
        let program: Vec<RegVal> = (0..NUM_CHANNELS)
            .map(|ch| RegVal::new(regs::channel_base(ch) | control.reg(), raw))
            .collect();
        let report = bus.write_sequence(&program).await;
        obs.set(value).map_err(Xs9922Error::Control)?;
        Ok(report)
    }

    /// Read a picture control back from channel 0.
    pub async fn read_picture(
        &self,
        bus: &dyn RegisterBus,
        control: PictureControl,
    ) -> Result<i64, TransportError> {
        let raw = bus.read(regs::channel_base(0) | control.reg()).await?;
        Ok(control.decode(raw))
    }
}
