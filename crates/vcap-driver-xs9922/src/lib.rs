//! Driver for the XS9922 four-channel analog-HD to MIPI CSI-2 deserializer.
//!
//! The chip receives up to four analog camera signals and forwards them as
//! four CSI-2 virtual channels on one 4-lane link. This crate covers:
//!
//! - power sequencing of the chip ([`power`])
//! - the static mode table and closest-size selection ([`modes`])
//! - register programs for bring-up, mode change and streaming ([`regs`], [`stream`])
//! - channel presence detection with debounce ([`detect`], [`debounce`], [`poller`])
//! - the request surface a capture pipeline talks to ([`device`], [`request`], [`status`])
//!
//! # Architecture
//!
//! Register I/O goes through [`vcap_core::RegisterBus`] and power lines
//! through [`vcap_core::PowerControl`], so the whole driver runs against
//! `vcap-driver-mock` in tests.
//!
//! ```rust,ignore
//! use vcap_driver_xs9922::{Xs9922, Xs9922Config};
//!
//! let config = Xs9922Config::load_from("xs9922.toml")?;
//! let dev = Xs9922::probe(config, bus, power).await?;
//! dev.set_stream(true).await?;
//! ```

pub mod config;
pub mod controls;
pub mod debounce;
pub mod detect;
pub mod device;
pub mod error;
pub mod modes;
pub mod poller;
pub mod power;
pub mod regs;
pub mod request;
pub mod status;
pub mod stream;

pub use config::Xs9922Config;
pub use controls::{Controls, PictureControl};
pub use debounce::{ChannelChange, HotplugEvent};
pub use device::{ChannelDump, Xs9922};
pub use error::Xs9922Error;
pub use modes::{BusFormat, Fraction, ScanField, VideoMode, MODES};
pub use request::{FormatRequest, FormatWhich, PadFormat, Request, Response};
pub use status::{CommandOutput, StatusCommand};
