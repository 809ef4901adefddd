//! Device configuration.
//!
//! Loaded from (later sources override earlier ones):
//! 1. built-in defaults
//! 2. a TOML file
//! 3. environment variables prefixed with `XS9922_`
//!
//! ```toml
//! module_name = "CMK-OT1522-FG3"
//! lens_name = "default"
//! module_facing = "back"
//! default_mode = "1280x720"
//! ```

use crate::error::Xs9922Error;
use crate::modes::{self, VideoMode};
use anyhow::Context;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Accepted range for the post-enable settle delay, in milliseconds.
pub const SETTLE_RANGE_MS: std::ops::RangeInclusive<u64> = 200..=400;

/// Per-device settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Xs9922Config {
    /// Position of the module among the board's capture front-ends.
    pub module_index: u32,
    /// Module name reported to the capture pipeline. Required.
    pub module_name: String,
    /// Lens name reported to the capture pipeline. Required.
    pub lens_name: String,
    /// `front` or `back`.
    pub module_facing: String,
    /// Mode programmed at probe, as `WIDTHxHEIGHT`.
    pub default_mode: String,
    /// Poll period while all channels are present.
    pub fast_poll_ms: u64,
    /// Poll period while any channel is absent.
    pub slow_poll_ms: u64,
    /// Consecutive differing polls before a hotplug change is confirmed.
    pub debounce_ticks: u8,
    /// Wait after enabling outputs on stream start.
    pub stream_settle_ms: u64,
    /// Leave the chip unprogrammed on format changes; the mode program is
    /// then applied on stream start instead.
    pub sensor_output_disabled: bool,
    /// Check the chip id during probe.
    pub verify_chip_id: bool,
}

impl Default for Xs9922Config {
    fn default() -> Self {
        Self {
            module_index: 0,
            module_name: "default".into(),
            lens_name: "default".into(),
            module_facing: "back".into(),
            default_mode: "1920x1080".into(),
            fast_poll_ms: 100,
            slow_poll_ms: 1000,
            debounce_ticks: 2,
            stream_settle_ms: 300,
            sensor_output_disabled: false,
            verify_chip_id: true,
        }
    }
}

impl Xs9922Config {
    /// Load from a TOML file plus `XS9922_*` environment overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("XS9922_"))
            .extract()
            .with_context(|| format!("loading xs9922 config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build from an inline TOML table, e.g. a device entry of a larger file.
    pub fn from_toml(value: &toml::Value) -> Result<Self, Xs9922Error> {
        let config: Self = value
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| Xs9922Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations probe cannot work with.
    pub fn validate(&self) -> Result<(), Xs9922Error> {
        if self.module_name.trim().is_empty() {
            return Err(Xs9922Error::MissingProperty("module_name"));
        }
        if self.lens_name.trim().is_empty() {
            return Err(Xs9922Error::MissingProperty("lens_name"));
        }
        if self.module_facing.trim().is_empty() {
            return Err(Xs9922Error::MissingProperty("module_facing"));
        }
        if self.fast_poll_ms == 0 || self.slow_poll_ms == 0 {
            return Err(Xs9922Error::InvalidConfig(
                "poll intervals must be non-zero".into(),
            ));
        }
        if self.debounce_ticks == 0 {
            return Err(Xs9922Error::InvalidConfig(
                "debounce_ticks must be at least 1".into(),
            ));
        }
        if !SETTLE_RANGE_MS.contains(&self.stream_settle_ms) {
            return Err(Xs9922Error::InvalidConfig(format!(
                "stream_settle_ms {} outside {}..={}",
                self.stream_settle_ms,
                SETTLE_RANGE_MS.start(),
                SETTLE_RANGE_MS.end()
            )));
        }
        Ok(())
    }

    /// Mode named by `default_mode`, falling back to the first table entry.
    pub fn default_video_mode(&self) -> &'static VideoMode {
        match modes::find_by_label(&self.default_mode) {
            Some(mode) => mode,
            None => {
                tracing::warn!(
                    default_mode = %self.default_mode,
                    "unknown default mode, using {}",
                    modes::MODES[0].label()
                );
                &modes::MODES[0]
            }
        }
    }

    /// [`fast_poll_ms`](Self::fast_poll_ms) as a duration.
    pub fn fast_poll(&self) -> Duration {
        Duration::from_millis(self.fast_poll_ms)
    }

    /// [`slow_poll_ms`](Self::slow_poll_ms) as a duration.
    pub fn slow_poll(&self) -> Duration {
        Duration::from_millis(self.slow_poll_ms)
    }

    /// [`stream_settle_ms`](Self::stream_settle_ms) as a duration.
    pub fn stream_settle(&self) -> Duration {
        Duration::from_millis(self.stream_settle_ms)
    }
}
