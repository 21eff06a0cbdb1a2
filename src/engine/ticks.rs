//! Microsecond to carrier-cycle conversion
//!
//! Durations are quantised to whole carrier cycles in integer arithmetic,
//! so a one second sample at 433.92 MHz comes out exact. A playback entry
//! holds `cycles - 1` in a 16-bit repetition counter, so samples longer than
//! `0x10000` cycles are split and the excess carried into later entries.

use crate::config::TX_MAX_TICKS;
use crate::types::TxStatus;

/// Micro-cycles per cycle: `duration_us * carrier_hz` is in these units
const MICRO: u64 = 1_000_000;
const HALF_CYCLE: u64 = MICRO / 2;

/// Converts durations for one carrier frequency
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickConverter {
    carrier_hz: u32,
}

impl TickConverter {
    /// Converter for a carrier in Hz
    ///
    /// # Panics
    ///
    /// If `carrier_hz` is zero.
    #[must_use]
    pub fn for_carrier(carrier_hz: u32) -> Self {
        assert!(carrier_hz > 0, "carrier frequency must be non-zero");
        Self { carrier_hz }
    }

    /// Carrier frequency in Hz
    #[must_use]
    pub const fn carrier_hz(&self) -> u32 {
        self.carrier_hz
    }

    /// Length of one carrier cycle in microseconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cycle_us(&self) -> f32 {
        1_000_000.0 / self.carrier_hz as f32
    }

    /// Nearest whole number of cycles for a duration, halves rounding up
    #[must_use]
    pub const fn cycles(&self, duration_us: u32) -> u64 {
        (self.micro_cycles(duration_us) + HALF_CYCLE) / MICRO
    }

    /// Exact length of a duration in millionths of a cycle
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn micro_cycles(&self, duration_us: u32) -> u64 {
        // u32 * u32 leaves headroom for the rounding offset in a u64
        duration_us as u64 * self.carrier_hz as u64
    }
}

/// Rounds a run of durations to cycles, carrying the rounding error
///
/// Each sample is rounded together with the error left by the ones before
/// it, so the played total never drifts more than half a cycle from the
/// exact total no matter how many fractional samples a session has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleRounder {
    ticks: TickConverter,
    /// Carried error plus half a cycle, in `0..MICRO`
    bias: u64,
}

impl CycleRounder {
    /// Rounder with no carried error
    #[must_use]
    pub const fn new(ticks: TickConverter) -> Self {
        Self { ticks, bias: HALF_CYCLE }
    }

    /// Converter in use
    #[must_use]
    pub const fn converter(&self) -> &TickConverter {
        &self.ticks
    }

    /// Carried rounding error in millionths of a cycle, within half a cycle
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn remainder(&self) -> i64 {
        // bias < MICRO
        self.bias as i64 - HALF_CYCLE as i64
    }

    /// Cycles for the next duration
    pub fn next_cycles(&mut self, duration_us: u32) -> u64 {
        let total = self.ticks.micro_cycles(duration_us) + self.bias;
        self.bias = total % MICRO;
        total / MICRO
    }
}

/// One slice drained from a [`CarryOver`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CarryChunk {
    /// Entry value (cycles - 1 semantics already applied by the caller)
    pub ticks: u16,
    /// Level of the carried sample
    pub level: bool,
    /// `Ok` while more remains, the sample's own status on the final slice
    pub status: TxStatus,
}

/// Remainder of a sample too long for one entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CarryOver {
    remaining: u64,
    level: bool,
    status: TxStatus,
}

impl CarryOver {
    /// Empty remainder
    #[must_use]
    pub const fn new() -> Self {
        Self {
            remaining: 0,
            level: false,
            status: TxStatus::Ok,
        }
    }

    /// Ticks still to be emitted
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Nothing left to drain
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Keep `ticks` of a sample for later passes
    pub fn stash(&mut self, ticks: u64, level: bool, status: TxStatus) {
        self.remaining = ticks;
        self.level = level;
        self.status = status;
    }

    /// Drop any pending remainder
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Take the next slice of at most [`TX_MAX_TICKS`]
    pub fn take(&mut self) -> Option<CarryChunk> {
        if self.remaining == 0 {
            return None;
        }
        let (ticks, status) = match u16::try_from(self.remaining) {
            Ok(t) => (t, self.status),
            Err(_) => (TX_MAX_TICKS, TxStatus::Ok),
        };
        self.remaining -= u64::from(ticks);
        Some(CarryChunk {
            ticks,
            level: self.level,
            status,
        })
    }
}
