//! Callback traits for the timing engines
//!
//! All of these run in interrupt context. Implementations must return in
//! bounded time and must not allocate or block.

use crate::types::{LevelDuration, TxData};

/// Pull producer for the TX engine
pub trait TxSource {
    /// Next sample
    fn next_sample(&mut self) -> TxData;
}

impl<F> TxSource for F
where
    F: FnMut() -> TxData,
{
    fn next_sample(&mut self) -> TxData {
        self()
    }
}

/// Notified once per completed packet boundary
pub trait SignalSent {
    /// A packet finished playing
    fn signal_sent(&mut self);
}

impl<F> SignalSent for F
where
    F: FnMut(),
{
    fn signal_sent(&mut self) {
        self();
    }
}

/// Receives captured edges from the RX engine
pub trait CaptureSink {
    /// `level` held for `duration_us` before the edge
    fn capture(&mut self, level: bool, duration_us: u32);
}

impl<F> CaptureSink for F
where
    F: FnMut(bool, u32),
{
    fn capture(&mut self, level: bool, duration_us: u32) {
        self(level, duration_us);
    }
}

/// Receives silence timeouts from the RX engine
pub trait TimeoutSink {
    /// No edge seen for the armed period
    fn timeout(&mut self);
}

impl<F> TimeoutSink for F
where
    F: FnMut(),
{
    fn timeout(&mut self) {
        self();
    }
}

/// Adapts a [`LevelDuration`] generator into a [`TxSource`]
///
/// `Reset` ends a packet, `End` ends the transmission.
pub struct LevelDurationSource<F> {
    generator: F,
}

impl<F> LevelDurationSource<F>
where
    F: FnMut() -> LevelDuration,
{
    /// Wrap a generator
    pub const fn new(generator: F) -> Self {
        Self { generator }
    }
}

impl<F> TxSource for LevelDurationSource<F>
where
    F: FnMut() -> LevelDuration,
{
    fn next_sample(&mut self) -> TxData {
        (self.generator)().into()
    }
}
