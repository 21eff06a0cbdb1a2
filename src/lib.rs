//! Sub-GHz / Infrared Signal Firmware Library
//!
//! This library provides the signal-timing core for an STM32WB-based
//! handheld with a CC1101 sub-GHz transceiver and an infrared LED and
//! receiver. A lazily produced stream of (level, duration) pulses is played
//! out on a carrier with microsecond precision, and received edges are
//! turned back into (level, duration) pairs.
//!
//! # Architecture
//!
//! The firmware is organized in layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    APPLICATION LAYER                         │
//! │  Protocol encoders / decoders (TxSource, CaptureSink)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     SIGNAL ENGINES                           │
//! │  TX playback (ping/pong DMA ring)  │  RX edge capture        │
//! │  Radio control (region, presets, antenna path)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   HAL / DRIVER LAYER                         │
//! │  TIM1 + DMA1  │  TIM2 capture  │  CC1101 over SPI  │  GPIO   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    RTOS / SCHEDULER                          │
//! │           embassy-rs (async/await executor)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **State machine plus short critical sections**: thread code and
//!   interrupt handlers agree on the session phase through one atomic state
//!   word. Buffers and hardware handles sit in a critical-section cell held
//!   only for bookkeeping; producers and callbacks run outside it
//! - **Type-driven design**: samples, statuses and states are enums
//! - **No unsafe in library code**: register access goes through the PAC
//! - **Hardware behind traits**: the engines run unchanged against a host
//!   simulator
//! - **Contract violations panic**: runtime radio failures return `Result`

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Logging macros, must come first
#[macro_use]
mod fmt;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;

/// Hardware Abstraction Layer
///
/// STM32WB55 timer, DMA and GPIO bindings.
#[cfg(feature = "embedded")]
pub mod hal;

/// Peripheral Drivers
///
/// Register-level driver for the CC1101 transceiver.
pub mod drivers;

/// Signal Engines
///
/// Async TX playback and RX capture sharing one state machine.
pub mod engine;

/// Radio Control Logic
///
/// Region policy, presets, antenna path and the control surface.
pub mod radio;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::types::*;

    // Engines
    pub use crate::engine::{
        CaptureHardware, CaptureSink, CarrierLimits, EngineState, LevelDurationSource, SignalPort,
        SignalSent, TimeoutSink, TxHardware, TxSource,
    };

    // Radio
    pub use crate::radio::{Preset, RadioError, RfSwitch, SubGhzRadio, Transceiver};

    // Error handling
    pub use core::result::Result;

    // Logging
    #[cfg(feature = "embedded")]
    pub use defmt::{debug, error, info, trace, warn};
}
