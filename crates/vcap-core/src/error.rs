//! Error types shared by every vcap driver.
//!
//! The top-level type is [`VcapError`]. Driver crates define their own
//! `thiserror` enums and convert into [`VcapError::Driver`] with a
//! [`DriverErrorKind`] so callers can branch on the category without knowing
//! the concrete driver.
//!
//! ## Error Hierarchy
//!
//! - **`Transport`**: a single register read or write failed on the bus.
//!   Usually transient (arbitration loss, NACK during a hotplug glitch).
//! - **`Sequence`**: one or more writes of a register program failed. The
//!   program still ran to completion; the hardware may be partially configured.
//! - **`Power`**: a gpio/clock/pinctrl collaborator refused an operation.
//! - **`ParameterReadOnly`** / **`ParameterOutOfRange`**: a control value
//!   was rejected before anything reached the bus.
//! - **`Driver`**: structured, categorised driver error. Configuration
//!   problems (missing module name, zero poll interval) arrive here with
//!   [`DriverErrorKind::Configuration`].

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Category of a [`DriverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Probe-time failure (chip id mismatch, power-up failed).
    Initialization,
    /// Invalid configuration or request that can never succeed as given.
    Configuration,
    /// Bus-level communication failure.
    Communication,
    /// Hardware reported or exhibited a fault.
    Hardware,
    /// Request argument outside the accepted domain.
    InvalidParameter,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Configuration => "configuration",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
        };
        write!(f, "{}", label)
    }
}

/// Structured driver error carrying the driver name and a category.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Driver that raised the error (`"xs9922"`).
    pub driver_type: String,
    /// Error category.
    pub kind: DriverErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl DriverError {
    /// Build a driver error from its parts.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Failure of a single register transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The device did not acknowledge the address or data phase.
    #[error("register {addr:#06x}: no acknowledge")]
    Nack {
        /// Register being accessed.
        addr: u16,
    },

    /// The adapter reported an I/O failure.
    #[error("register {addr:#06x}: {message}")]
    Io {
        /// Register being accessed.
        addr: u16,
        /// Adapter's description of the failure.
        message: String,
    },

    /// The bus adapter has gone away.
    #[error("bus adapter disconnected")]
    Disconnected,
}

impl TransportError {
    /// Register address involved, if the failure is tied to one.
    pub fn addr(&self) -> Option<u16> {
        match self {
            Self::Nack { addr } | Self::Io { addr, .. } => Some(*addr),
            Self::Disconnected => None,
        }
    }
}

/// Aggregate failure of a register program that was run to completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{failed} of {attempted} register writes failed (first: {first})")]
pub struct SequenceError {
    /// Writes issued, including the failed ones.
    pub attempted: usize,
    /// Writes that failed.
    pub failed: usize,
    /// First failure in program order.
    pub first: TransportError,
}

// =============================================================================
// Power/clock/pin control errors
// =============================================================================

/// Failure reported by a [`crate::power::PowerControl`] collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PowerError {
    /// The named gpio line is not wired on this board.
    #[error("gpio line '{0}' is not wired")]
    MissingLine(&'static str),

    /// The reference clock refused a rate change or enable.
    #[error("clock: {0}")]
    Clock(String),
}

// =============================================================================
// VcapError
// =============================================================================

/// Convenience alias for results using the crate error type.
pub type VcapResult<T> = std::result::Result<T, VcapError>;

/// Primary error type for vcap drivers.
#[derive(Error, Debug)]
pub enum VcapError {
    /// A single register transaction failed.
    ///
    /// **Error Type**: Usually transient. Retrying the operation is safe; the
    /// driver itself does not retry.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A register program completed with failed writes.
    #[error("Register sequence error: {0}")]
    Sequence(#[from] SequenceError),

    /// Power, clock or pin control failed.
    #[error("Power control error: {0}")]
    Power(#[from] PowerError),

    /// Attempted to modify a read-only parameter.
    #[error("Parameter '{0}' is read-only")]
    ParameterReadOnly(String),

    /// Value outside the parameter's range.
    #[error("Parameter '{name}' value {value} outside [{min}, {max}]")]
    ParameterOutOfRange {
        /// Parameter name.
        name: String,
        /// Rejected value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },

    /// Structured driver error with category
    #[error("{0}")]
    Driver(DriverError),
}

impl VcapError {
    /// Category of this error, for callers that branch on it.
    pub fn kind(&self) -> DriverErrorKind {
        match self {
            VcapError::Transport(_) | VcapError::Sequence(_) => DriverErrorKind::Communication,
            VcapError::Power(_) => DriverErrorKind::Hardware,
            VcapError::ParameterReadOnly(_)
            | VcapError::ParameterOutOfRange { .. } => DriverErrorKind::InvalidParameter,
            VcapError::Driver(e) => e.kind,
        }
    }
}
