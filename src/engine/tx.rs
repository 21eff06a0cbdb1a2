//! Async TX playback
//!
//! Start fills buffer 0 synchronously and starts the carrier timer. From
//! then on the period stream's interrupts drive everything: the half
//! transfer refills the idle buffer, the transfer complete swaps buffers
//! and walks the stop sequence. The thread side only requests a stop and
//! awaits the termination signal.
//!
//! User callbacks never run inside the port's critical section. They are
//! taken out of the shared cell, called, and put back, so a callback may
//! query the port it is registered on.

use super::buffer::{fill_flush, BufferPair, PlaybackBuffer, Refiller, TxStats};
use super::port::{CaptureHardware, DmaEvents, SignalPort, TxHardware, TxInner};
use super::source::{SignalSent, TxSource};
use super::state::EngineState;
use crate::config::TX_POLARITY_PRE_ROLL;

impl<'a, T: TxHardware, R: CaptureHardware> SignalPort<'a, T, R> {
    /// Register the sample producer
    ///
    /// # Panics
    ///
    /// Unless the port is idle.
    pub fn set_tx_data_callback(&self, source: &'a mut (dyn TxSource + Send)) {
        self.state.require(EngineState::Idle, "set_tx_data_callback");
        self.tx.lock(|cell| cell.borrow_mut().source = Some(source));
    }

    /// Register the packet-boundary notification
    ///
    /// # Panics
    ///
    /// Unless the port is idle.
    pub fn set_tx_signal_sent_callback(&self, callback: &'a mut (dyn SignalSent + Send)) {
        self.state.require(EngineState::Idle, "set_tx_signal_sent_callback");
        self.tx.lock(|cell| cell.borrow_mut().signal_sent = Some(callback));
    }

    /// Start streaming samples on a `carrier_hz` carrier
    ///
    /// # Panics
    ///
    /// If `duty` is outside (0, 1], the carrier is outside the port's
    /// limits, no producer is registered, or the port is not idle.
    pub fn start_async_tx(&self, carrier_hz: u32, duty: f32) {
        assert!(duty > 0.0 && duty <= 1.0, "start_async_tx: duty cycle {duty} outside (0, 1]");
        assert!(
            self.limits.contains(carrier_hz),
            "start_async_tx: carrier {carrier_hz} Hz outside port limits"
        );
        self.state.require(EngineState::Idle, "start_async_tx");

        let source = self.tx.lock(|cell| {
            let mut inner = cell.borrow_mut();
            assert!(inner.buffers.is_none(), "start_async_tx: buffers still allocated");
            inner.source.take()
        });
        let Some(source) = source else {
            panic!("start_async_tx: no data callback registered");
        };

        let mut refiller = Refiller::new(carrier_hz);
        let mut buffers = BufferPair::new();
        refiller.fill(buffers.get_mut(0), &mut *source, TX_POLARITY_PRE_ROLL);

        self.tx.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let inner = &mut *guard;
            inner.source = Some(source);

            // streams read the buffers in place: load from their final home
            let buffers = inner.buffers.insert(buffers);
            inner.hw.configure_carrier(carrier_hz, duty);
            inner.hw.configure_streams();
            inner.hw.load_polarity(buffers.get(0).polarity());
            inner.hw.load_periods(buffers.get(0).periods());
            inner.active = 0;
            inner.half_irq_enabled = true;
            inner.refiller = Some(refiller);

            self.stopped.reset();
            self.state.set(EngineState::AsyncTx);
            inner.hw.start();
        });

        info!("async tx started: carrier {} Hz, duty {}", carrier_hz, duty);
    }

    /// Ask the engine to stop at the next packet boundary and wait for it
    ///
    /// A stream already draining its final packet is left to finish.
    ///
    /// # Panics
    ///
    /// Unless a transmit session is active.
    pub async fn stop_async_tx(&self) {
        self.state.require_tx("stop_async_tx");
        if self
            .state
            .transition(EngineState::AsyncTx, EngineState::AsyncTxStopRequested)
        {
            debug!("async tx stop requested");
        }
        self.wait_tx_termination().await;
    }

    /// Wait until playback halts, then release the peripheral
    ///
    /// Must be awaited from thread context.
    ///
    /// # Panics
    ///
    /// Unless a transmit session is active.
    pub async fn wait_tx_termination(&self) {
        self.state.require_tx("wait_tx_termination");
        self.stopped.wait().await;

        let stats = self.tx.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.hw.release();
            inner.buffers = None;
            inner.half_irq_enabled = false;
            let stats = inner.refiller.take().map(|r| r.stats()).unwrap_or_default();
            inner.last_stats = stats;
            stats
        });
        self.state.set(EngineState::Idle);

        info!(
            "async tx done: on {} us, off {} us, duty {}%",
            stats.mark_us,
            stats.space_us,
            stats.duty_percent()
        );
    }

    /// Playback has halted and awaits [`Self::wait_tx_termination`]
    #[must_use]
    pub fn is_async_tx_complete(&self) -> bool {
        self.state.get() == EngineState::AsyncTxStopped
    }

    /// Statistics of the last finished session
    #[must_use]
    pub fn last_tx_stats(&self) -> TxStats {
        self.tx.lock(|cell| cell.borrow().last_stats)
    }

    /// Period stream interrupt
    ///
    /// The half transfer is handled before the transfer complete when both
    /// are pending.
    ///
    /// # Panics
    ///
    /// On a transfer error, or on an event the current state cannot
    /// explain.
    pub fn on_period_dma_irq(&self, events: DmaEvents) {
        assert!(!events.error, "tx period stream: DMA transfer error");
        if events.half {
            self.on_half_transfer();
        }
        if events.complete {
            let packet_sent = self.tx.lock(|cell| self.on_transfer_complete(&mut cell.borrow_mut()));
            if packet_sent {
                self.notify_signal_sent();
            }
        }
    }

    /// Polarity stream interrupt
    ///
    /// Runs one update after the period stream moved on, so the active
    /// buffer is already the next one; its polarity loads without pre-roll.
    ///
    /// # Panics
    ///
    /// On a transfer error or outside a transmit session.
    pub fn on_polarity_dma_irq(&self, events: DmaEvents) {
        assert!(!events.error, "tx polarity stream: DMA transfer error");
        if !events.complete {
            return;
        }
        let state = self.state.get();
        assert!(
            state.is_tx() && state != EngineState::AsyncTxStopped,
            "tx polarity stream: completion in state {}",
            state.as_str()
        );
        self.tx.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let inner = &mut *guard;
            if let Some(buffers) = inner.buffers.as_ref() {
                inner.hw.load_polarity(buffers.get(inner.active).polarity());
            }
        });
    }

    /// Refill the idle buffer; the producer runs outside the lock
    fn on_half_transfer(&self) {
        let job = self.tx.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let inner = &mut *guard;
            if !inner.half_irq_enabled {
                return None;
            }
            let state = self.state.get();
            let Some(buffers) = inner.buffers.as_ref() else {
                panic!("tx half transfer without buffers in state {}", state.as_str());
            };
            let current = buffers.get(inner.active);

            if current.last_packet_end {
                inner.hw.set_half_transfer_irq(false);
                inner.half_irq_enabled = false;
                None
            } else if !current.packet_end || state == EngineState::AsyncTx {
                let (Some(source), Some(refiller)) = (inner.source.take(), inner.refiller.take()) else {
                    panic!("tx half transfer without data callback");
                };
                Some((source, refiller, inner.active ^ 1))
            } else if matches!(
                state,
                EngineState::AsyncTxStopRequested | EngineState::AsyncTxLast
            ) {
                // wait for the transfer complete to queue the flush
                None
            } else {
                panic!("tx half transfer in state {}", state.as_str());
            }
        });
        let Some((source, mut refiller, next)) = job else {
            return;
        };

        // the idle buffer is not read until the transfer complete loads it
        let mut refilled = PlaybackBuffer::new();
        refiller.fill(&mut refilled, &mut *source, 0);
        let last = refilled.last_packet_end;

        self.tx.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let inner = &mut *guard;
            inner.source = Some(source);
            inner.refiller = Some(refiller);
            if let Some(buffers) = inner.buffers.as_mut() {
                *buffers.get_mut(next) = refilled;
            }
            if last {
                inner.hw.set_half_transfer_irq(false);
                inner.half_irq_enabled = false;
            }
        });
        if last
            && self
                .state
                .transition(EngineState::AsyncTx, EngineState::AsyncTxLast)
        {
            trace!("async tx: final samples queued");
        }
    }

    /// Swap buffers or walk the stop sequence; true when a packet finished
    fn on_transfer_complete(&self, inner: &mut TxInner<'a, T>) -> bool {
        let state = self.state.get();
        assert!(
            state.is_tx() && state != EngineState::AsyncTxStopped,
            "tx transfer complete in state {}",
            state.as_str()
        );
        let Some(buffers) = inner.buffers.as_mut() else {
            panic!("tx transfer complete without buffers");
        };
        let finished = inner.active;
        let next = finished ^ 1;
        let (packet_end, last_packet_end) = {
            let b = buffers.get(finished);
            (b.packet_end, b.last_packet_end)
        };

        if state == EngineState::AsyncTxStopInProgress {
            inner.hw.halt();
            self.state.set(EngineState::AsyncTxStopped);
            self.stopped.signal(());
            trace!("async tx halted");
        } else if last_packet_end
            || (packet_end && state == EngineState::AsyncTxStopRequested)
        {
            self.state.set(EngineState::AsyncTxStopInProgress);
            fill_flush(buffers.get_mut(next));
            inner.hw.load_periods(buffers.get(next).periods());
            inner.active = next;
        } else {
            inner.hw.load_periods(buffers.get(next).periods());
            inner.active = next;
        }

        packet_end && self.state.get() != EngineState::AsyncTxStopped
    }

    fn notify_signal_sent(&self) {
        let callback = self.tx.lock(|cell| cell.borrow_mut().signal_sent.take());
        if let Some(callback) = callback {
            callback.signal_sent();
            self.tx.lock(|cell| cell.borrow_mut().signal_sent = Some(callback));
        }
    }
}
