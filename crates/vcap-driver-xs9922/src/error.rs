//! XS9922 driver errors.

use crate::modes::BusFormat;
use thiserror::Error;
use vcap_core::{
    DriverError, DriverErrorKind, PowerError, SequenceError, TransportError, VcapError,
};

/// Errors raised by the XS9922 driver.
#[derive(Error, Debug)]
pub enum Xs9922Error {
    /// No mode in the table produces the requested bus format.
    #[error("no mode produces bus format {format}")]
    NoMatchingMode {
        /// Requested format.
        format: BusFormat,
    },

    /// Probe read a different chip.
    #[error("unexpected chip id {found:#06x}, expected {expected:#06x}")]
    ChipIdMismatch {
        /// XS9922 id.
        expected: u16,
        /// Id read from the chip.
        found: u16,
    },

    /// A required configuration property is empty.
    #[error("missing required property '{0}'")]
    MissingProperty(&'static str),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Enumeration past the end of a table.
    #[error("{what} index {index} out of range")]
    IndexOutOfRange {
        /// Table being enumerated.
        what: &'static str,
        /// Requested index.
        index: u32,
    },

    /// Enumerated mode does not carry the caller's bus format.
    #[error("bus format {requested} not offered (expected {expected})")]
    FormatMismatch {
        /// Format the caller asked for.
        requested: BusFormat,
        /// Format of the mode.
        expected: BusFormat,
    },

    /// Status surface write that is not `0`, `1` or `2`.
    #[error("unrecognised status command '{0}'")]
    InvalidCommand(String),

    /// Control write refused by its observable.
    #[error("control rejected: {0}")]
    Control(#[source] VcapError),

    /// Register access failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Some writes of a register program failed.
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    /// Power sequencing failed.
    #[error(transparent)]
    Power(#[from] PowerError),
}

impl From<Xs9922Error> for VcapError {
    fn from(err: Xs9922Error) -> Self {
        let kind = match err {
            Xs9922Error::Transport(e) => return VcapError::Transport(e),
            Xs9922Error::Sequence(e) => return VcapError::Sequence(e),
            Xs9922Error::Power(e) => return VcapError::Power(e),
            Xs9922Error::Control(e) => return e,
            Xs9922Error::MissingProperty(_) | Xs9922Error::InvalidConfig(_) => {
                DriverErrorKind::Configuration
            }
            Xs9922Error::ChipIdMismatch { .. } => DriverErrorKind::Initialization,
            Xs9922Error::NoMatchingMode { .. }
            | Xs9922Error::IndexOutOfRange { .. }
            | Xs9922Error::FormatMismatch { .. }
            | Xs9922Error::InvalidCommand(_) => DriverErrorKind::InvalidParameter,
        };
        VcapError::Driver(DriverError::new("xs9922", kind, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Xs9922Error::ChipIdMismatch {
            expected: 0x9922,
            found: 0x0000,
        };
        assert_eq!(
            err.to_string(),
            "unexpected chip id 0x0000, expected 0x9922"
        );
    }

    #[test]
    fn test_maps_to_driver_kind() {
        let err: VcapError = Xs9922Error::NoMatchingMode {
            format: BusFormat::Yuyv8_2x8,
        }
        .into();
        assert_eq!(err.kind(), DriverErrorKind::InvalidParameter);
        assert!(err.to_string().contains("YUYV8_2X8"));

        let err: VcapError = Xs9922Error::MissingProperty("module_name").into();
        assert_eq!(err.kind(), DriverErrorKind::Configuration);

        let err: VcapError = Xs9922Error::ChipIdMismatch {
            expected: 0x9922,
            found: 0x1234,
        }
        .into();
        assert_eq!(err.kind(), DriverErrorKind::Initialization);
    }

    #[test]
    fn test_transport_passes_through() {
        let err: VcapError = Xs9922Error::Transport(TransportError::Nack { addr: 0x2000 }).into();
        assert!(matches!(
            err,
            VcapError::Transport(TransportError::Nack { addr: 0x2000 })
        ));
    }
}
