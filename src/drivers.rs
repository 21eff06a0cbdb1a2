//! Peripheral Drivers
//!
//! Register-level drivers for external ICs.

pub mod cc1101;
