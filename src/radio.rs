//! Radio Control Logic
//!
//! Regulatory policy, register presets and the synchronous control surface
//! of the sub-GHz front end.

pub mod control;
pub mod preset;
pub mod region;

pub use control::{is_frequency_valid, path_for_frequency, rssi_dbm, RadioError, Regulation, RfSwitch, SubGhzRadio, Transceiver};
pub use preset::{Preset, RegisterTable};
pub use region::is_tx_allowed;
