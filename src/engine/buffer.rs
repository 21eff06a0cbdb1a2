//! Ping/pong playback buffers and the refill algorithm
//!
//! Each buffer carries two parallel streams: period entries for the carrier
//! timer's repetition counter and CCMR polarity words. While the DMA drains
//! one buffer, the half-transfer interrupt refills the other from the
//! producer. Refill is bounded by [`TX_BUFFER_ENTRIES`] and never
//! allocates.

use heapless::Vec;

use super::source::TxSource;
use super::ticks::{CarryOver, CycleRounder, TickConverter};
use crate::config::{
    TX_BUFFER_ENTRIES, TX_FLUSH_ENTRIES, TX_MAX_TICKS, TX_POLARITY_ENTRIES, TX_POLARITY_PRE_ROLL,
};
use crate::types::{Polarity, Pulse, TxStatus};

/// One half of the playback ring
#[derive(Clone, Debug, Default)]
pub struct PlaybackBuffer {
    periods: Vec<u16, TX_BUFFER_ENTRIES>,
    polarity: Vec<u8, TX_POLARITY_ENTRIES>,
    /// A packet boundary lies in this buffer
    pub packet_end: bool,
    /// The final sample of the transmission lies in this buffer
    pub last_packet_end: bool,
}

impl PlaybackBuffer {
    /// Empty buffer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            periods: Vec::new(),
            polarity: Vec::new(),
            packet_end: false,
            last_packet_end: false,
        }
    }

    /// Period stream (repetition counter values)
    #[must_use]
    pub fn periods(&self) -> &[u16] {
        &self.periods
    }

    /// Polarity stream, including any pre-roll
    #[must_use]
    pub fn polarity(&self) -> &[u8] {
        &self.polarity
    }

    /// Number of period entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// No period entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// No room for another period entry
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.periods.is_full()
    }

    /// Total carrier cycles this buffer plays
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.periods.iter().map(|&p| u64::from(p) + 1).sum()
    }

    fn reset(&mut self) {
        self.periods.clear();
        self.polarity.clear();
        self.packet_end = false;
        self.last_packet_end = false;
    }

    fn pre_roll(&mut self, count: usize) {
        for _ in 0..count {
            let _ = self.polarity.push(Polarity::Space.ccmr_word());
        }
    }

    fn push(&mut self, ticks: u16, level: bool) {
        if self.periods.push(ticks).is_ok() {
            // polarity capacity exceeds period capacity by the pre-roll
            let _ = self.polarity.push(Polarity::from_level(level).ccmr_word());
        }
    }
}

/// Both halves of the playback ring
#[derive(Clone, Debug, Default)]
pub struct BufferPair {
    buffers: [PlaybackBuffer; 2],
}

impl BufferPair {
    /// Two empty buffers
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffers: [PlaybackBuffer::new(), PlaybackBuffer::new()],
        }
    }

    /// Buffer by index (0 or 1)
    #[must_use]
    pub fn get(&self, index: usize) -> &PlaybackBuffer {
        &self.buffers[index & 1]
    }

    /// Mutable buffer by index (0 or 1)
    pub fn get_mut(&mut self, index: usize) -> &mut PlaybackBuffer {
        &mut self.buffers[index & 1]
    }
}

/// Accumulated mark/space time of one transmit session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxStats {
    /// Microseconds at the active level
    pub mark_us: u64,
    /// Microseconds at the inactive level
    pub space_us: u64,
}

impl TxStats {
    /// Add a sample's duration
    pub fn record(&mut self, pulse: Pulse) {
        if pulse.level {
            self.mark_us += u64::from(pulse.duration_us);
        } else {
            self.space_us += u64::from(pulse.duration_us);
        }
    }

    /// Mark time as a percentage of the total, 0 for an empty session
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duty_percent(&self) -> f32 {
        let total = self.mark_us + self.space_us;
        if total == 0 {
            0.0
        } else {
            self.mark_us as f32 * 100.0 / total as f32
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TxStats {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "on {} us, off {} us, duty {}%",
            self.mark_us,
            self.space_us,
            self.duty_percent()
        );
    }
}

/// Converts producer samples into playback entries
///
/// Holds the per-session conversion state: the cycle rounder with its
/// fractional remainder, the carry-over of long samples and the session
/// statistics.
#[derive(Clone, Copy, Debug)]
pub struct Refiller {
    rounder: CycleRounder,
    carry: CarryOver,
    stats: TxStats,
}

impl Refiller {
    /// Fresh refill state for a carrier frequency
    #[must_use]
    pub fn new(carrier_hz: u32) -> Self {
        Self {
            rounder: CycleRounder::new(TickConverter::for_carrier(carrier_hz)),
            carry: CarryOver::new(),
            stats: TxStats::default(),
        }
    }

    /// Tick converter in use
    #[must_use]
    pub const fn converter(&self) -> &TickConverter {
        self.rounder.converter()
    }

    /// Fractional cycles carried into the next sample, in millionths
    #[must_use]
    pub const fn remainder(&self) -> i64 {
        self.rounder.remainder()
    }

    /// Pending carry-over
    #[must_use]
    pub const fn carry(&self) -> &CarryOver {
        &self.carry
    }

    /// Statistics so far
    #[must_use]
    pub const fn stats(&self) -> TxStats {
        self.stats
    }

    /// Refill `buf` from the carry-over and `source`
    ///
    /// Stops when the buffer is full or the producer reports anything but
    /// `Ok`. `polarity_shift` space words are written ahead of the polarity
    /// stream. The buffer always ends up with more entries than the shift,
    /// padded with single-cycle spaces.
    ///
    /// # Panics
    ///
    /// If `polarity_shift` exceeds the pre-roll the buffer is sized for.
    pub fn fill(&mut self, buf: &mut PlaybackBuffer, source: &mut dyn TxSource, polarity_shift: usize) {
        assert!(polarity_shift <= TX_POLARITY_PRE_ROLL, "polarity shift too large");
        buf.reset();
        buf.pre_roll(polarity_shift);

        let mut status = TxStatus::Ok;
        while !buf.is_full() && status == TxStatus::Ok {
            if let Some(chunk) = self.carry.take() {
                buf.push(chunk.ticks, chunk.level);
                status = chunk.status;
                continue;
            }

            let data = source.next_sample();
            status = data.status();
            let Some(pulse) = data.pulse() else {
                continue;
            };

            let cycles = self.rounder.next_cycles(pulse.duration_us);
            if cycles == 0 {
                if buf.is_empty() && status == TxStatus::Done {
                    // an empty packet: keep pulling rather than end on nothing
                    status = TxStatus::Ok;
                }
                continue;
            }

            self.stats.record(pulse);
            match u16::try_from(cycles - 1) {
                Ok(ticks) => buf.push(ticks, pulse.level),
                Err(_) => {
                    self.carry.stash(cycles - 1, pulse.level, status);
                    status = TxStatus::Ok;
                }
            }
        }

        buf.last_packet_end = status == TxStatus::LastDone;
        buf.packet_end = buf.last_packet_end || status == TxStatus::Done;

        // A pre-rolled buffer is already consumed by both start-up updates
        // when it holds a single entry, so pad it with a space.
        while buf.len() <= polarity_shift {
            buf.push(0, false);
        }
    }
}

/// Load the stop flush: two single-cycle spaces, flagged as the end
pub fn fill_flush(buf: &mut PlaybackBuffer) {
    buf.reset();
    for _ in 0..TX_FLUSH_ENTRIES {
        buf.push(0, false);
    }
    buf.packet_end = true;
    buf.last_packet_end = true;
}

// `u16::try_from` above relies on the entry limit being the full u16 range.
const _: () = assert!(TX_MAX_TICKS == u16::MAX);
