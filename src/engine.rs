//! Async signal-timing engines
//!
//! TX playback turns a lazily produced (level, duration) stream into timer
//! repetition counts and output-compare polarity words, streamed by two DMA
//! channels from a ping/pong ring. RX capture timestamps edges with an
//! input-capture timer and hands (level, duration) pairs to a callback.
//!
//! Both engines of a peripheral share one [`SignalPort`]. Contract
//! violations (wrong state, bad parameters) panic: the state machine is the
//! only synchronisation between thread code and the interrupt handlers.

pub mod buffer;
pub mod port;
pub mod rx;
pub mod source;
pub mod state;
pub mod ticks;
pub mod tx;

pub use buffer::{fill_flush, BufferPair, PlaybackBuffer, Refiller, TxStats};
pub use port::{CaptureEvents, CaptureHardware, CarrierLimits, DmaEvents, SignalPort, TxHardware};
pub use source::{CaptureSink, LevelDurationSource, SignalSent, TimeoutSink, TxSource};
pub use state::{EngineState, StateCell};
pub use ticks::{CarryChunk, CarryOver, CycleRounder, TickConverter};
