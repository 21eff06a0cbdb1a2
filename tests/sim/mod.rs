//! Host model of the carrier timer, its two DMA streams and the capture timer
//!
//! Each [`Sim::step`] is one timer update event. On an update the segment
//! that just ended is recorded (only while the counter runs), the
//! repetition counter reloads from RCR, then the polarity stream writes
//! CCMR2 and the period stream writes RCR. Flags raised by the transfers
//! are delivered polarity stream first, like the firmware's update handler.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use subghz_firmware::engine::{CaptureHardware, DmaEvents, SignalPort, TxHardware};
use subghz_firmware::types::Polarity;

/// Hardware calls in the order the engine made them
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxCall {
    ConfigureCarrier(u32),
    ConfigureStreams,
    LoadPolarity(usize),
    LoadPeriods(usize),
    HalfIrq(bool),
    Start,
    Halt,
    Release,
}

#[derive(Default)]
pub struct SimState {
    pub calls: Vec<TxCall>,
    pub duty: f32,
    polarity: Vec<u8>,
    polarity_pos: usize,
    periods: Vec<u16>,
    period_pos: usize,
    half_irq: bool,
    ccmr: u8,
    rcr: u16,
    rep: u16,
    counting: bool,
    pub halted: bool,
    pub updates: usize,
    /// Played segments: (mark, carrier cycles)
    pub segments: Vec<(bool, u32)>,
    pending_polarity: DmaEvents,
    pending_period: DmaEvents,
}

impl SimState {
    fn update_event(&mut self) {
        if self.counting {
            let mark = Polarity::from_ccmr_word(self.ccmr).is_some_and(Polarity::is_mark);
            self.segments.push((mark, u32::from(self.rep) + 1));
        }
        self.rep = self.rcr;
        self.updates += 1;

        if self.polarity_pos < self.polarity.len() {
            self.ccmr = self.polarity[self.polarity_pos];
            self.polarity_pos += 1;
            if self.polarity_pos == self.polarity.len() {
                self.pending_polarity.complete = true;
            }
        }

        if self.period_pos < self.periods.len() {
            self.rcr = self.periods[self.period_pos];
            self.period_pos += 1;
            if self.half_irq && self.period_pos == self.periods.len().div_ceil(2) {
                self.pending_period.half = true;
            }
            if self.period_pos == self.periods.len() {
                self.pending_period.complete = true;
            }
        }
    }

    fn take_pending(&mut self) -> (DmaEvents, DmaEvents) {
        (
            core::mem::take(&mut self.pending_polarity),
            core::mem::take(&mut self.pending_period),
        )
    }
}

/// Shared handle to the simulated carrier timer
#[derive(Clone, Default)]
pub struct Sim(Arc<Mutex<SimState>>);

impl Sim {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hardware half to hand to a [`SignalPort`]
    pub fn tx(&self) -> SimTx {
        SimTx(self.clone())
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.0.lock().unwrap()
    }

    /// Deliver pending flags, or run one update event and deliver its flags
    ///
    /// Returns `false` once the timer has been halted.
    pub fn step<T: TxHardware, R: CaptureHardware>(&self, port: &SignalPort<'_, T, R>) -> bool {
        let (polarity, period) = {
            let mut s = self.state();
            if s.halted {
                return false;
            }
            let pending = s.take_pending();
            if pending == (DmaEvents::default(), DmaEvents::default()) {
                s.update_event();
                s.take_pending()
            } else {
                pending
            }
        };
        if polarity != DmaEvents::default() {
            port.on_polarity_dma_irq(polarity);
        }
        if period != DmaEvents::default() {
            port.on_period_dma_irq(period);
        }
        true
    }

    /// Step until halted, at most `limit` times; returns the steps taken
    pub fn run<T: TxHardware, R: CaptureHardware>(&self, port: &SignalPort<'_, T, R>, limit: usize) -> usize {
        let mut steps = 0;
        while steps < limit && self.step(port) {
            steps += 1;
        }
        steps
    }

    /// Level the output holds now
    pub fn output_is_mark(&self) -> bool {
        Polarity::from_ccmr_word(self.state().ccmr).is_some_and(Polarity::is_mark)
    }

    /// Played segments with equal neighbours merged
    pub fn runs(&self) -> Vec<(bool, u64)> {
        let mut runs: Vec<(bool, u64)> = Vec::new();
        for &(mark, cycles) in &self.state().segments {
            match runs.last_mut() {
                Some((level, total)) if *level == mark => *total += u64::from(cycles),
                _ => runs.push((mark, u64::from(cycles))),
            }
        }
        runs
    }

    pub fn calls(&self) -> Vec<TxCall> {
        self.state().calls.clone()
    }
}

pub struct SimTx(Sim);

impl TxHardware for SimTx {
    fn configure_carrier(&mut self, carrier_hz: u32, duty: f32) {
        let mut s = self.0.state();
        s.calls.push(TxCall::ConfigureCarrier(carrier_hz));
        s.duty = duty;
        s.ccmr = Polarity::Space.ccmr_word();
    }

    fn configure_streams(&mut self) {
        let mut s = self.0.state();
        s.calls.push(TxCall::ConfigureStreams);
        s.half_irq = true;
        s.pending_polarity = DmaEvents::default();
        s.pending_period = DmaEvents::default();
    }

    fn load_polarity(&mut self, words: &[u8]) {
        let mut s = self.0.state();
        s.calls.push(TxCall::LoadPolarity(words.len()));
        s.polarity = words.to_vec();
        s.polarity_pos = 0;
    }

    fn load_periods(&mut self, periods: &[u16]) {
        let mut s = self.0.state();
        s.calls.push(TxCall::LoadPeriods(periods.len()));
        s.periods = periods.to_vec();
        s.period_pos = 0;
    }

    fn set_half_transfer_irq(&mut self, enabled: bool) {
        let mut s = self.0.state();
        s.calls.push(TxCall::HalfIrq(enabled));
        s.half_irq = enabled;
    }

    fn start(&mut self) {
        let mut s = self.0.state();
        s.calls.push(TxCall::Start);
        s.halted = false;
        // DMA -> RCR, then RCR -> repetition counter, then count
        s.update_event();
        s.update_event();
        s.counting = true;
    }

    fn halt(&mut self) {
        let mut s = self.0.state();
        s.calls.push(TxCall::Halt);
        s.counting = false;
        s.halted = true;
    }

    fn release(&mut self) {
        self.0.state().calls.push(TxCall::Release);
    }
}

/// Capture timer calls
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RxCall {
    Start(u16),
    Stop,
    ArmTimeout(u32),
}

pub struct CaptureState {
    pub calls: Vec<RxCall>,
    pub input_high: bool,
}

/// Shared handle to the simulated capture timer; the input idles high
#[derive(Clone)]
pub struct SimCapture(Arc<Mutex<CaptureState>>);

impl Default for SimCapture {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(CaptureState {
            calls: Vec::new(),
            input_high: true,
        })))
    }
}

impl SimCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&self, high: bool) {
        self.0.lock().unwrap().input_high = high;
    }

    pub fn calls(&self) -> Vec<RxCall> {
        self.0.lock().unwrap().calls.clone()
    }
}

impl CaptureHardware for SimCapture {
    fn start(&mut self, prescaler: u16) {
        self.0.lock().unwrap().calls.push(RxCall::Start(prescaler));
    }

    fn stop(&mut self) {
        self.0.lock().unwrap().calls.push(RxCall::Stop);
    }

    fn arm_timeout(&mut self, timeout_us: u32) {
        self.0.lock().unwrap().calls.push(RxCall::ArmTimeout(timeout_us));
    }

    fn input_level(&self) -> bool {
        self.0.lock().unwrap().input_high
    }
}
