//! Core abstractions shared by vcap capture-front-end drivers.
//!
//! - [`bus`]: register transport and register programs
//! - [`power`]: gpio, reference clock and pinctrl collaborators
//! - [`observable`]: user-visible parameters with change notification
//! - [`error`]: the shared error hierarchy

pub mod bus;
pub mod error;
pub mod observable;
pub mod power;

pub use bus::{RegVal, RegisterBus, SharedBus, WriteReport};
pub use error::{
    DriverError, DriverErrorKind, PowerError, SequenceError, TransportError, VcapError,
    VcapResult,
};
pub use observable::{Observable, ParameterMetadata};
pub use power::{GpioLine, PinState, PowerControl, SharedPower};
