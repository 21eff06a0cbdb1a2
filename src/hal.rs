//! Hardware Abstraction Layer
//!
//! STM32WB55 bindings for the signal engines and the sub-GHz front end.
//! Only this module touches peripheral registers; the engines see the
//! [`TxHardware`](crate::engine::TxHardware) and
//! [`CaptureHardware`](crate::engine::CaptureHardware) traits.

pub mod gpio;
pub mod tim_dma;
pub mod timer;
