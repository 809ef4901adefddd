//! Per-channel signal detection.

use crate::regs::{self, NUM_CHANNELS};
use vcap_core::RegisterBus;

/// Presence readings from one poll. `None` marks a failed read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSample {
    /// Reading per channel.
    pub present: [Option<bool>; NUM_CHANNELS as usize],
}

impl ChannelSample {
    /// Fold into a bitmap, keeping `previous` bits for channels that failed
    /// to read. Bit `i` is channel `i`.
    pub fn to_bitmap(&self, previous: u8) -> u8 {
        self.present
            .iter()
            .enumerate()
            .fold(0u8, |acc, (ch, reading)| {
                let bit = 1u8 << ch;
                let set = match reading {
                    Some(present) => *present,
                    None => previous & bit != 0,
                };
                if set {
                    acc | bit
                } else {
                    acc
                }
            })
    }

    /// Channels whose read failed.
    pub fn failed_channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.present
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(ch, _)| ch as u8)
    }
}

/// Decode a video status byte. The loss bit is active high, so a signal is
/// present when it reads back cleared.
pub const fn signal_present(status: u8) -> bool {
    status & regs::VIDEO_LOSS_BIT == 0
}

/// Read the video status register of every channel.
pub async fn sample_channels(bus: &dyn RegisterBus) -> ChannelSample {
    let mut sample = ChannelSample::default();
    for ch in 0..NUM_CHANNELS {
        let addr = regs::video_status_reg(ch);
        sample.present[usize::from(ch)] = match bus.read(addr).await {
            Ok(status) => Some(signal_present(status)),
            Err(e) => {
                tracing::warn!(channel = ch, error = %e, "video status read failed, keeping last state");
                None
            }
        };
    }
    sample
}

/// Sample all channels and fold into a bitmap against `previous`.
pub async fn read_bitmap(bus: &dyn RegisterBus, previous: u8) -> (ChannelSample, u8) {
    let sample = sample_channels(bus).await;
    let bitmap = sample.to_bitmap(previous);
    (sample, bitmap)
}
