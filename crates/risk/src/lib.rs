//! # Zenith Risk Crate
//!
//! The sole authority over "may this trade proceed?" and over emergency-stop
//! state (spec §4.3). Owns the `system_config.kill_switch` record end to end:
//! every enable/disable, every validation rejection, and the periodic
//! max-hold-time supervisor all live here.

pub mod error;
pub mod gate;

pub use error::{RejectionKind, RiskError, RiskRejection};
pub use gate::{RiskGate, ValidationOutcome};
