//! TIM1/TIM2/DMA1 register sequencing for the signal engines
//!
//! Carrier: TIM1 runs at the carrier frequency with CH3N in PWM mode 2.
//! Every update event requests two DMA transfers: the polarity stream
//! writes CCMR2 (PWM or forced inactive), the period stream writes RCR so
//! the next entry lasts `RCR + 1` carrier cycles.
//!
//! The HAL owns the DMA channel vectors, so the streams run with their
//! interrupt-enable bits clear and the flags are sampled from the TIM1
//! update interrupt, which fires on the same event that triggers both
//! transfers. [`take_tx_events`] reports the polarity stream first.
//!
//! Capture: TIM2 in reset slave mode on TI1 rising edges. CH1 captures the
//! rising edge, CH2 the falling edge via the indirect input, CH3 compares
//! for the silence timeout.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_stm32::pac;
use embassy_stm32::pac::bdma::vals::{Dir, Pl, Size};
use embassy_stm32::pac::gpio::vals::{Idr, Moder};
use embassy_stm32::pac::timer::vals::{CcmrInputCcs, Ocm, Sms, Ts};
use micromath::F32Ext;

use super::timer::delay_us;
use crate::config::{dma, timers, RX_CAPTURE_AUTO_RELOAD, SYSTEM_CLOCK_HZ};
use crate::engine::{CaptureEvents, CaptureHardware, DmaEvents, TxHardware};

/// IR TX pin PB9, AFRH slot
const IR_TX_PIN: usize = 9;
/// IR RX pin PA0
const IR_RX_PIN: usize = 0;
/// Alternate function 1: TIM1 / TIM2
const AF_TIM: u8 = 1;

static HALF_SAMPLING: AtomicBool = AtomicBool::new(false);

/// TIM1 carrier with DMA1 polarity and period streams
pub struct CarrierTimer {
    _private: (),
}

impl CarrierTimer {
    /// Create the handle; registers are untouched until a session starts
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    fn load_stream(channel: usize, addr: u32, len: usize) {
        let ch = pac::DMA1.ch(channel);
        let enabled = ch.cr().read().en();
        if enabled {
            ch.cr().modify(|w| w.set_en(false));
        }
        ch.mar().write_value(addr);
        #[allow(clippy::cast_possible_truncation)]
        ch.ndtr().write(|w| w.set_ndt(len as u16));
        if enabled {
            ch.cr().modify(|w| w.set_en(true));
        }
    }
}

impl Default for CarrierTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TxHardware for CarrierTimer {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn configure_carrier(&mut self, carrier_hz: u32, duty: f32) {
        pac::RCC.apb2enr().modify(|w| w.set_tim1en(true));

        let tim = pac::TIM1;
        tim.cr1().modify(|w| w.set_cen(false));
        tim.rcr().write(|w| w.set_rep(0));
        tim.cnt().write(|w| w.set_cnt(0));
        tim.psc().write_value(0);
        tim.cr1().modify(|w| w.set_arpe(true));

        let arr = (SYSTEM_CLOCK_HZ / carrier_hz).saturating_sub(1).clamp(1, u32::from(u16::MAX));
        tim.arr().write(|w| w.set_arr(arr as u16));
        let compare = ((arr + 1) as f32 * (1.0 - duty)).round() as u16;
        tim.ccr(timers::CARRIER_CHANNEL).write(|w| w.set_ccr(compare));

        // CH3 lives in CCMR2, slot 0; PWM mode 2 is written by the polarity stream
        tim.ccmr_output(1).modify(|w| {
            w.set_ocpe(0, true);
            w.set_ocm(0, Ocm::FORCE_INACTIVE);
        });
        tim.ccer().modify(|w| {
            w.set_ccnp(timers::CARRIER_CHANNEL, false);
            w.set_ccne(timers::CARRIER_CHANNEL, true);
        });
        tim.bdtr().modify(|w| w.set_moe(true));
        tim.dier().modify(|w| {
            w.set_ude(true);
            w.set_uie(true);
        });
    }

    fn configure_streams(&mut self) {
        pac::RCC.ahb1enr().modify(|w| {
            w.set_dma1en(true);
            w.set_dmamux1en(true);
        });

        let streams = [
            (
                dma::POLARITY_CHANNEL,
                pac::TIM1.ccmr_output(1).as_ptr() as u32,
                Size::BITS32,
                Size::BITS8,
                Pl::VERY_HIGH,
            ),
            (
                dma::PERIOD_CHANNEL,
                pac::TIM1.rcr().as_ptr() as u32,
                Size::BITS16,
                Size::BITS16,
                Pl::MEDIUM,
            ),
        ];
        for (channel, peripheral, psize, msize, priority) in streams {
            pac::DMAMUX1
                .ccr(channel)
                .write(|w| w.set_dmareq_id(dma::TIM1_UP_REQUEST));
            let ch = pac::DMA1.ch(channel);
            ch.cr().write(|w| {
                w.set_dir(Dir::FROM_MEMORY);
                w.set_minc(true);
                w.set_pinc(false);
                w.set_psize(psize);
                w.set_msize(msize);
                w.set_pl(priority);
            });
            ch.par().write_value(peripheral);
            pac::DMA1.ifcr().write(|w| w.set_gif(channel, true));
        }
        HALF_SAMPLING.store(true, Ordering::Release);
    }

    fn load_polarity(&mut self, words: &[u8]) {
        Self::load_stream(dma::POLARITY_CHANNEL, words.as_ptr() as u32, words.len());
    }

    fn load_periods(&mut self, periods: &[u16]) {
        Self::load_stream(dma::PERIOD_CHANNEL, periods.as_ptr() as u32, periods.len());
    }

    fn set_half_transfer_irq(&mut self, enabled: bool) {
        HALF_SAMPLING.store(enabled, Ordering::Release);
    }

    fn start(&mut self) {
        let tim = pac::TIM1;
        tim.sr().modify(|w| w.set_uif(false));
        pac::DMA1.ch(dma::POLARITY_CHANNEL).cr().modify(|w| w.set_en(true));
        pac::DMA1.ch(dma::PERIOD_CHANNEL).cr().modify(|w| w.set_en(true));
        delay_us(5);
        // DMA -> RCR
        tim.egr().write(|w| w.set_ug(true));
        delay_us(5);

        // drive the pin low before handing it to the timer
        pac::GPIOB.bsrr().write(|w| w.set_br(IR_TX_PIN, true));
        pac::GPIOB.afr(IR_TX_PIN / 8).modify(|w| w.set_afr(IR_TX_PIN % 8, AF_TIM));
        pac::GPIOB.moder().modify(|w| w.set_moder(IR_TX_PIN, Moder::ALTERNATE));

        critical_section::with(|_| {
            // RCR -> repetition counter
            tim.egr().write(|w| w.set_ug(true));
            tim.cr1().modify(|w| w.set_cen(true));
        });
    }

    fn halt(&mut self) {
        pac::DMA1.ch(dma::PERIOD_CHANNEL).cr().modify(|w| w.set_en(false));
        pac::DMA1.ch(dma::POLARITY_CHANNEL).cr().modify(|w| w.set_en(false));
        pac::TIM1.cr1().modify(|w| w.set_cen(false));
        HALF_SAMPLING.store(false, Ordering::Release);
    }

    fn release(&mut self) {
        pac::GPIOB.bsrr().write(|w| w.set_br(IR_TX_PIN, true));
        pac::GPIOB.moder().modify(|w| w.set_moder(IR_TX_PIN, Moder::OUTPUT));
        pac::TIM1.dier().write(|_| {});
        pac::RCC.apb2rstr().modify(|w| w.set_tim1rst(true));
        pac::RCC.apb2rstr().modify(|w| w.set_tim1rst(false));
        pac::RCC.apb2enr().modify(|w| w.set_tim1en(false));
    }
}

/// Sample the TX stream flags and acknowledge the ones sampled
///
/// Call from the TIM1 update interrupt. Returns `(polarity, period)`; the
/// polarity stream must be handled first.
#[must_use]
pub fn take_tx_events() -> (DmaEvents, DmaEvents) {
    // UIF only: the status flags clear on a written zero
    pac::TIM1.sr().write(|w| {
        w.0 = u32::MAX;
        w.set_uif(false);
    });
    let isr = pac::DMA1.isr().read();
    let seen = |channel| DmaEvents {
        half: isr.htif(channel),
        complete: isr.tcif(channel),
        error: isr.teif(channel),
    };
    let (polarity, period) = (seen(dma::POLARITY_CHANNEL), seen(dma::PERIOD_CHANNEL));
    pac::DMA1.ifcr().write(|w| {
        w.0 = polarity.clear_bits(dma::POLARITY_CHANNEL) | period.clear_bits(dma::PERIOD_CHANNEL);
    });
    (
        DmaEvents { half: false, ..polarity },
        DmaEvents {
            half: period.half && HALF_SAMPLING.load(Ordering::Acquire),
            ..period
        },
    )
}

/// TIM2 edge capture
pub struct CaptureTimer {
    _private: (),
}

impl CaptureTimer {
    /// Create the handle
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for CaptureTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureHardware for CaptureTimer {
    fn start(&mut self, prescaler: u16) {
        pac::RCC.apb1enr1().modify(|w| w.set_tim2en(true));
        pac::RCC.ahb2enr().modify(|w| w.set_gpioaen(true));
        pac::GPIOA.afr(0).modify(|w| w.set_afr(IR_RX_PIN, AF_TIM));
        pac::GPIOA.moder().modify(|w| w.set_moder(IR_RX_PIN, Moder::ALTERNATE));

        let tim = pac::TIM2;
        tim.psc().write_value(prescaler.saturating_sub(1));
        tim.arr().write_value(RX_CAPTURE_AUTO_RELOAD);
        tim.cr1().modify(|w| w.set_arpe(false));
        tim.smcr().modify(|w| {
            w.set_ts(Ts::TI1FP1);
            w.set_sms(Sms::RESET_MODE);
            w.set_msm(true);
        });
        tim.ccmr_input(0).modify(|w| {
            w.set_ccs(timers::CAPTURE_RISING_CHANNEL, CcmrInputCcs::TI4);
            w.set_icf(timers::CAPTURE_RISING_CHANNEL, 0);
            w.set_ccs(timers::CAPTURE_FALLING_CHANNEL, CcmrInputCcs::TI3);
            w.set_icf(timers::CAPTURE_FALLING_CHANNEL, 0);
        });
        tim.ccer().modify(|w| {
            w.set_ccp(timers::CAPTURE_RISING_CHANNEL, false);
            w.set_ccp(timers::CAPTURE_FALLING_CHANNEL, true);
            w.set_cce(timers::CAPTURE_RISING_CHANNEL, true);
            w.set_cce(timers::CAPTURE_FALLING_CHANNEL, true);
        });
        tim.dier().modify(|w| {
            w.set_ccie(timers::CAPTURE_RISING_CHANNEL, true);
            w.set_ccie(timers::CAPTURE_FALLING_CHANNEL, true);
        });
        tim.cnt().write_value(0);
        tim.cr1().modify(|w| w.set_cen(true));
    }

    fn stop(&mut self) {
        pac::TIM2.cr1().modify(|w| w.set_cen(false));
        pac::TIM2.dier().write(|_| {});
        pac::RCC.apb1rstr1().modify(|w| w.set_tim2rst(true));
        pac::RCC.apb1rstr1().modify(|w| w.set_tim2rst(false));
        pac::RCC.apb1enr1().modify(|w| w.set_tim2en(false));
    }

    fn arm_timeout(&mut self, timeout_us: u32) {
        let tim = pac::TIM2;
        tim.ccr(timers::CAPTURE_TIMEOUT_CHANNEL).write_value(timeout_us);
        tim.ccmr_output(1).modify(|w| w.set_ocm(0, Ocm::ACTIVE_ON_MATCH));
        tim.ccer().modify(|w| w.set_cce(timers::CAPTURE_TIMEOUT_CHANNEL, true));
        tim.dier().modify(|w| w.set_ccie(timers::CAPTURE_TIMEOUT_CHANNEL, true));
    }

    fn input_level(&self) -> bool {
        pac::GPIOA.idr().read().idr(IR_RX_PIN) == Idr::HIGH
    }
}

/// Sample the capture flags with their latched values and clear only those
///
/// Call from the TIM2 interrupt.
#[must_use]
pub fn take_capture_events() -> CaptureEvents {
    let tim = pac::TIM2;
    let sr = tim.sr().read();
    let mut events = CaptureEvents::default();
    if sr.ccif(timers::CAPTURE_TIMEOUT_CHANNEL) {
        events.timeout = true;
    }
    if sr.ccif(timers::CAPTURE_RISING_CHANNEL) {
        events.rising = Some(tim.ccr(timers::CAPTURE_RISING_CHANNEL).read());
    }
    if sr.ccif(timers::CAPTURE_FALLING_CHANNEL) {
        events.falling = Some(tim.ccr(timers::CAPTURE_FALLING_CHANNEL).read());
    }
    tim.sr().write(|w| w.0 = events.status_clear_word());
    events
}
