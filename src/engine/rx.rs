//! Async RX capture
//!
//! The capture timer resets its counter on every rising edge. CH1 latches
//! the rising edge, CH2 the falling edge. The input idles high, so CH2
//! reads the space length directly and the mark length is CH1 minus the
//! previous CH2.

use super::port::{CaptureEvents, CaptureHardware, SignalPort, TxHardware};
use super::source::{CaptureSink, TimeoutSink};
use super::state::EngineState;
use crate::config::RX_CAPTURE_PRESCALER;

impl<'a, T: TxHardware, R: CaptureHardware> SignalPort<'a, T, R> {
    /// Register the edge callback
    ///
    /// # Panics
    ///
    /// Unless the port is idle.
    pub fn set_rx_capture_callback(&self, sink: &'a mut (dyn CaptureSink + Send)) {
        self.state.require(EngineState::Idle, "set_rx_capture_callback");
        self.rx.lock(|cell| cell.borrow_mut().capture = Some(sink));
    }

    /// Register the silence callback
    ///
    /// # Panics
    ///
    /// Unless the port is idle.
    pub fn set_rx_timeout_callback(&self, sink: &'a mut (dyn TimeoutSink + Send)) {
        self.state.require(EngineState::Idle, "set_rx_timeout_callback");
        self.rx.lock(|cell| cell.borrow_mut().timeout = Some(sink));
    }

    /// Start capturing edges
    ///
    /// # Panics
    ///
    /// Unless the port is idle.
    pub fn start_async_rx(&self) {
        self.state.require(EngineState::Idle, "start_async_rx");
        self.rx.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.previous_falling = 0;
            self.state.set(EngineState::AsyncRx);
            inner.hw.start(RX_CAPTURE_PRESCALER);
        });
        info!("async rx started");
    }

    /// Stop capturing edges
    ///
    /// # Panics
    ///
    /// Unless capture is running.
    pub fn stop_async_rx(&self) {
        self.state.require(EngineState::AsyncRx, "stop_async_rx");
        self.rx.lock(|cell| cell.borrow_mut().hw.stop());
        self.state.set(EngineState::Idle);
        info!("async rx stopped");
    }

    /// Report silence after `timeout_us` without a rising edge
    ///
    /// # Panics
    ///
    /// Unless capture is running.
    pub fn set_rx_timeout(&self, timeout_us: u32) {
        self.state.require(EngineState::AsyncRx, "set_rx_timeout");
        self.rx.lock(|cell| cell.borrow_mut().hw.arm_timeout(timeout_us));
        debug!("async rx timeout {} us", timeout_us);
    }

    /// Capture timer interrupt
    ///
    /// Callbacks run outside the port's critical section and may call
    /// back into the port.
    ///
    /// # Panics
    ///
    /// If any flag is pending while capture is not running.
    pub fn on_capture_irq(&self, events: CaptureEvents) {
        if events == CaptureEvents::default() {
            return;
        }
        self.state.require(EngineState::AsyncRx, "capture interrupt");

        let (silent, mark, mut timeout, mut capture) = self.rx.lock(|cell| {
            let mut inner = cell.borrow_mut();
            // The counter resets once per period (on CH1), not per sample:
            // a signal that started a few microseconds before the compare
            // fires can still be reported as a timeout.
            let silent = events.timeout && inner.hw.input_level();
            // the input idles high, so the low run ending on a rising edge is the mark
            let mark = events.rising.map(|rising| rising.wrapping_sub(inner.previous_falling));
            if let Some(falling) = events.falling {
                inner.previous_falling = falling;
            }
            (silent, mark, inner.timeout.take(), inner.capture.take())
        });

        if silent {
            if let Some(sink) = timeout.as_deref_mut() {
                sink.timeout();
            }
        }
        if let Some(sink) = capture.as_deref_mut() {
            if let Some(duration) = mark {
                sink.capture(true, duration);
            }
            // counter was reset on the rising edge: CH2 is the space length
            if let Some(falling) = events.falling {
                sink.capture(false, falling);
            }
        }

        self.rx.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.timeout = timeout;
            inner.capture = capture;
        });
    }
}
