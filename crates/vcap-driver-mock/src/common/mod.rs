//! Common infrastructure for mock collaborators.
//!
//! - **mode**: Operational modes (Instant, Realistic, Chaos)
//! - **faults**: Per-register failure injection
//! - **rng**: Seeded random number generator

pub mod faults;
pub mod mode;
pub mod rng;

pub use faults::{Access, FaultCount, FaultTable};
pub use mode::MockMode;
pub use rng::MockRng;
