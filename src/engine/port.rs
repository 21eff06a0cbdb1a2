//! One signal peripheral: shared state, TX half, RX half
//!
//! A [`SignalPort`] owns everything the async engines of one peripheral
//! touch: the state word, the playback ring, the callbacks and the hardware
//! handles. It is built `const` so firmware can place it in a `static` and
//! reach it from both tasks and interrupt handlers.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use super::buffer::{BufferPair, Refiller, TxStats};
use super::source::{CaptureSink, SignalSent, TimeoutSink, TxSource};
use super::state::{EngineState, StateCell};
use crate::config::{timers, INFRARED_BANDS, SUBGHZ_BANDS};
use crate::types::FrequencyBand;

/// Carrier timer plus the two DMA streams feeding it
///
/// Implementations only sequence registers. All decisions about what to
/// load and when are made by the engine.
pub trait TxHardware {
    /// Program the carrier timer for `carrier_hz` with `duty` in (0, 1]
    fn configure_carrier(&mut self, carrier_hz: u32, duty: f32);

    /// Set up both DMA streams with half, complete and error interrupts
    fn configure_streams(&mut self);

    /// Point the polarity stream at `words`
    fn load_polarity(&mut self, words: &[u8]);

    /// Point the period stream at `periods`
    fn load_periods(&mut self, periods: &[u16]);

    /// Enable or disable the period stream's half-transfer interrupt
    fn set_half_transfer_irq(&mut self, enabled: bool);

    /// Enable the streams, latch the first entry and start counting
    fn start(&mut self);

    /// Stop the timer and both streams
    fn halt(&mut self);

    /// Return pins and clocks to their idle configuration
    fn release(&mut self);
}

/// Input-capture timer
pub trait CaptureHardware {
    /// Configure edge capture with `prescaler` and start the timer
    fn start(&mut self, prescaler: u16);

    /// Stop the timer and release the pin
    fn stop(&mut self);

    /// Arm the silence compare `timeout_us` ticks after the last reset
    fn arm_timeout(&mut self, timeout_us: u32);

    /// Live level of the input pin
    fn input_level(&self) -> bool;
}

/// Interrupt flags of one DMA stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DmaEvents {
    /// Half transfer
    pub half: bool,
    /// Transfer complete
    pub complete: bool,
    /// Transfer error
    pub error: bool,
}

impl DmaEvents {
    /// Only the half-transfer flag
    #[must_use]
    pub const fn half() -> Self {
        Self {
            half: true,
            complete: false,
            error: false,
        }
    }

    /// Only the transfer-complete flag
    #[must_use]
    pub const fn complete() -> Self {
        Self {
            half: false,
            complete: true,
            error: false,
        }
    }

    /// Write-one-to-clear IFCR bits acknowledging exactly these flags
    ///
    /// Channel `n` owns bits `4n..4n+4`: global, complete, half, error.
    /// Flags raised after the status read are left pending.
    #[must_use]
    pub const fn clear_bits(&self, channel: usize) -> u32 {
        let mut bits = 0;
        if self.complete {
            bits |= 1 << 1;
        }
        if self.half {
            bits |= 1 << 2;
        }
        if self.error {
            bits |= 1 << 3;
        }
        bits << (4 * channel)
    }
}

/// Interrupt flags of the capture timer, with the latched capture values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureEvents {
    /// Rising edge captured (CH1 value)
    pub rising: Option<u32>,
    /// Falling edge captured (CH2 value)
    pub falling: Option<u32>,
    /// Silence compare fired
    pub timeout: bool,
}

impl CaptureEvents {
    /// Status register value clearing exactly the flags behind these events
    ///
    /// The capture timer's status flags are cleared by writing zero and
    /// left alone by writing one, and CCxIF of channel `n` sits at bit
    /// `n + 1`. A read-modify-write would drop edges latched after the read.
    #[must_use]
    pub const fn status_clear_word(&self) -> u32 {
        let mut word = u32::MAX;
        if self.rising.is_some() {
            word &= !(1 << (timers::CAPTURE_RISING_CHANNEL + 1));
        }
        if self.falling.is_some() {
            word &= !(1 << (timers::CAPTURE_FALLING_CHANNEL + 1));
        }
        if self.timeout {
            word &= !(1 << (timers::CAPTURE_TIMEOUT_CHANNEL + 1));
        }
        word
    }
}

/// Carrier frequencies a port accepts for TX
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CarrierLimits {
    bands: &'static [FrequencyBand],
}

impl CarrierLimits {
    /// Infrared LED carrier, 10 kHz to 56 kHz
    pub const INFRARED: Self = Self {
        bands: &INFRARED_BANDS,
    };

    /// The three CC1101 front-end bands
    pub const SUB_GHZ: Self = Self {
        bands: &SUBGHZ_BANDS,
    };

    /// Custom band list
    #[must_use]
    pub const fn new(bands: &'static [FrequencyBand]) -> Self {
        Self { bands }
    }

    /// Check a carrier frequency
    #[must_use]
    pub fn contains(&self, hz: u32) -> bool {
        self.bands.iter().any(|b| b.contains(hz))
    }
}

pub(super) struct TxInner<'a, T> {
    pub(super) hw: T,
    pub(super) source: Option<&'a mut (dyn TxSource + Send)>,
    pub(super) signal_sent: Option<&'a mut (dyn SignalSent + Send)>,
    pub(super) buffers: Option<BufferPair>,
    pub(super) refiller: Option<Refiller>,
    /// Buffer the period stream currently drains
    pub(super) active: usize,
    pub(super) half_irq_enabled: bool,
    pub(super) last_stats: TxStats,
}

pub(super) struct RxInner<'a, R> {
    pub(super) hw: R,
    pub(super) capture: Option<&'a mut (dyn CaptureSink + Send)>,
    pub(super) timeout: Option<&'a mut (dyn TimeoutSink + Send)>,
    pub(super) previous_falling: u32,
}

type Cell<T> = Mutex<CriticalSectionRawMutex, RefCell<T>>;

/// Async TX/RX engine pair for one peripheral
pub struct SignalPort<'a, T, R> {
    pub(super) state: StateCell,
    pub(super) limits: CarrierLimits,
    pub(super) tx: Cell<TxInner<'a, T>>,
    pub(super) rx: Cell<RxInner<'a, R>>,
    pub(super) stopped: Signal<CriticalSectionRawMutex, ()>,
}

impl<'a, T: TxHardware, R: CaptureHardware> SignalPort<'a, T, R> {
    /// Create an idle port
    #[must_use]
    pub const fn new(tx_hw: T, rx_hw: R, limits: CarrierLimits) -> Self {
        Self {
            state: StateCell::new(),
            limits,
            tx: Mutex::new(RefCell::new(TxInner {
                hw: tx_hw,
                source: None,
                signal_sent: None,
                buffers: None,
                refiller: None,
                active: 0,
                half_irq_enabled: false,
                last_stats: TxStats {
                    mark_us: 0,
                    space_us: 0,
                },
            })),
            rx: Mutex::new(RefCell::new(RxInner {
                hw: rx_hw,
                capture: None,
                timeout: None,
                previous_falling: 0,
            })),
            stopped: Signal::new(),
        }
    }

    /// Current engine state
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Any async operation in progress
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.get() != EngineState::Idle
    }

    /// Carrier frequencies this port accepts
    #[must_use]
    pub const fn limits(&self) -> CarrierLimits {
        self.limits
    }
}
