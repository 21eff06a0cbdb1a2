//! Engine state machine
//!
//! One state word per peripheral, shared by thread code and interrupt
//! handlers. Thread-side transitions that race an interrupt use
//! compare-and-swap; everything else is a plain store by the single writer
//! the state machine designates.
//!
//! ```text
//! Idle ──start_rx──► AsyncRx ──stop_rx──► Idle
//!
//! Idle ──start_tx──► AsyncTx ──producer LastDone──► AsyncTxLast ─┐
//!                       │                                         │ last buffer drained
//!                       └──stop_tx──► AsyncTxStopRequested ───────┤ packet buffer drained
//!                                                                 ▼
//!            Idle ◄──wait── AsyncTxStopped ◄──flush drained── AsyncTxStopInProgress
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Engine state
///
/// Variant order matters: every state at or after [`EngineState::AsyncTx`]
/// belongs to a transmit session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum EngineState {
    /// Peripheral unused
    Idle = 0,
    /// Capturing edges
    AsyncRx = 1,
    /// Streaming samples
    AsyncTx = 2,
    /// Producer delivered the final sample, draining
    AsyncTxLast = 3,
    /// Caller asked to stop at the next packet boundary
    AsyncTxStopRequested = 4,
    /// Flush buffer queued, the next completion halts the timer
    AsyncTxStopInProgress = 5,
    /// Timer halted, resources await release
    AsyncTxStopped = 6,
}

impl EngineState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::AsyncRx,
            2 => Self::AsyncTx,
            3 => Self::AsyncTxLast,
            4 => Self::AsyncTxStopRequested,
            5 => Self::AsyncTxStopInProgress,
            6 => Self::AsyncTxStopped,
            _ => Self::Idle,
        }
    }

    /// True for any state of a transmit session
    #[must_use]
    pub const fn is_tx(self) -> bool {
        self as u8 >= Self::AsyncTx as u8
    }

    /// Get state name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::AsyncRx => "AsyncRx",
            Self::AsyncTx => "AsyncTx",
            Self::AsyncTxLast => "AsyncTxLast",
            Self::AsyncTxStopRequested => "AsyncTxStopRequested",
            Self::AsyncTxStopInProgress => "AsyncTxStopInProgress",
            Self::AsyncTxStopped => "AsyncTxStopped",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for EngineState {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.as_str());
    }
}

/// Atomic holder for an [`EngineState`]
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Create a cell in [`EngineState::Idle`]
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(EngineState::Idle as u8))
    }

    /// Current state
    #[must_use]
    pub fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store a state unconditionally
    pub fn set(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move `from` -> `to` if the cell still holds `from`
    pub fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Panic unless the cell holds `expected`
    ///
    /// # Panics
    ///
    /// When the state differs: calling `op` there is a contract violation.
    #[track_caller]
    pub fn require(&self, expected: EngineState, op: &str) {
        let actual = self.get();
        assert!(
            actual == expected,
            "{op}: requires state {}, found {}",
            expected.as_str(),
            actual.as_str()
        );
    }

    /// Panic unless the cell holds a transmit state
    ///
    /// # Panics
    ///
    /// When no transmit session is active.
    #[track_caller]
    pub fn require_tx(&self, op: &str) {
        let actual = self.get();
        assert!(
            actual.is_tx(),
            "{op}: requires an active transmit session, found {}",
            actual.as_str()
        );
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
