//! Busy-wait timing
//!
//! TIM1 and TIM2 belong to the signal engines, so short register settling
//! delays spin on the core clock instead of a timer driver.

use crate::config::SYSTEM_CLOCK_HZ;

/// Core cycles per microsecond
pub const CYCLES_PER_US: u32 = SYSTEM_CLOCK_HZ / 1_000_000;

/// Spin for at least `us` microseconds
pub fn delay_us(us: u32) {
    cortex_m::asm::delay(us.saturating_mul(CYCLES_PER_US));
}

/// Spin for at least `ms` milliseconds
pub fn delay_ms(ms: u32) {
    for _ in 0..ms {
        delay_us(1_000);
    }
}

/// Busy-wait delay for drivers that take an `embedded_hal` delay
#[derive(Clone, Copy, Debug, Default)]
pub struct SpinDelay;

impl embedded_hal::delay::DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        delay_us(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        delay_ms(ms);
    }
}
