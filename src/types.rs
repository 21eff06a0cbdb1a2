//! Shared types used across the sub-GHz firmware
//!
//! This module defines the signal vocabulary exchanged between producers,
//! the timing engines, and the radio control surface.

use core::fmt;

use crate::config::ccmr;

/// One level held for a duration
///
/// `level == true` is a mark (carrier on / pin asserted),
/// `level == false` is a space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Pulse {
    /// Logic level
    pub level: bool,
    /// Duration in microseconds
    pub duration_us: u32,
}

impl Pulse {
    /// Create a pulse
    #[must_use]
    pub const fn new(level: bool, duration_us: u32) -> Self {
        Self { level, duration_us }
    }

    /// Mark (active level) of the given length
    #[must_use]
    pub const fn mark(duration_us: u32) -> Self {
        Self::new(true, duration_us)
    }

    /// Space (inactive level) of the given length
    #[must_use]
    pub const fn space(duration_us: u32) -> Self {
        Self::new(false, duration_us)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Pulse {
    fn format(&self, f: defmt::Formatter) {
        let tag = if self.level { "mark" } else { "space" };
        defmt::write!(f, "{}({}us)", tag, self.duration_us);
    }
}

/// Result of one pull from a TX producer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxData {
    /// A sample, more follow
    Ok(Pulse),
    /// Last sample of a packet; more packets follow
    Done(Pulse),
    /// Last sample of the whole transmission
    LastDone(Pulse),
    /// Nothing ready yet; ask again on the next refill
    Wait,
    /// Producer failed; the current refill ends without packet flags
    Error,
}

impl TxData {
    /// Completion status carried by this result
    #[must_use]
    pub const fn status(self) -> TxStatus {
        match self {
            Self::Ok(_) => TxStatus::Ok,
            Self::Done(_) => TxStatus::Done,
            Self::LastDone(_) => TxStatus::LastDone,
            Self::Wait => TxStatus::Wait,
            Self::Error => TxStatus::Error,
        }
    }

    /// Sample carried by this result, if any
    #[must_use]
    pub const fn pulse(self) -> Option<Pulse> {
        match self {
            Self::Ok(p) | Self::Done(p) | Self::LastDone(p) => Some(p),
            Self::Wait | Self::Error => None,
        }
    }
}

/// Payload-free status of a [`TxData`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TxStatus {
    /// Keep pulling
    #[default]
    Ok,
    /// Packet boundary
    Done,
    /// End of all data
    LastDone,
    /// Producer stalled
    Wait,
    /// Producer failed
    Error,
}

impl TxStatus {
    /// Get status name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Done => "done",
            Self::LastDone => "last-done",
            Self::Wait => "wait",
            Self::Error => "error",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TxStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.as_str());
    }
}

/// Level/duration stream element with sentinels
///
/// This is the shape protocol encoders usually emit. It converts into
/// [`TxData`] so an encoder can feed the TX engine directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelDuration {
    /// A concrete sample
    Pulse(Pulse),
    /// No data ready yet
    Wait,
    /// Packet finished, more follow
    Reset,
    /// Stream finished
    End,
}

impl LevelDuration {
    /// Build a concrete sample
    #[must_use]
    pub const fn make(level: bool, duration_us: u32) -> Self {
        Self::Pulse(Pulse::new(level, duration_us))
    }

    /// Is this the wait sentinel
    #[must_use]
    pub const fn is_wait(self) -> bool {
        matches!(self, Self::Wait)
    }

    /// Is this a reset or end sentinel
    #[must_use]
    pub const fn is_reset(self) -> bool {
        matches!(self, Self::Reset | Self::End)
    }
}

impl From<LevelDuration> for TxData {
    fn from(value: LevelDuration) -> Self {
        match value {
            LevelDuration::Pulse(p) => Self::Ok(p),
            LevelDuration::Wait => Self::Wait,
            // Zero-length samples never reach the DMA stream, only their status does.
            LevelDuration::Reset => Self::Done(Pulse::default()),
            LevelDuration::End => Self::LastDone(Pulse::default()),
        }
    }
}

/// Output-compare mode streamed per playback entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Carrier PWM running
    Mark,
    /// Output forced inactive
    #[default]
    Space,
}

impl Polarity {
    /// Polarity for a logic level
    #[must_use]
    pub const fn from_level(level: bool) -> Self {
        if level {
            Self::Mark
        } else {
            Self::Space
        }
    }

    /// CCMR2 word the polarity DMA stream writes
    #[must_use]
    pub const fn ccmr_word(self) -> u8 {
        match self {
            Self::Mark => ccmr::MARK,
            Self::Space => ccmr::SPACE,
        }
    }

    /// Decode a CCMR2 word, `None` for anything the engine never writes
    #[must_use]
    pub const fn from_ccmr_word(word: u8) -> Option<Self> {
        match word {
            ccmr::MARK => Some(Self::Mark),
            ccmr::SPACE => Some(Self::Space),
            _ => None,
        }
    }

    /// Logic level of this polarity
    #[must_use]
    pub const fn is_mark(self) -> bool {
        matches!(self, Self::Mark)
    }
}

/// Inclusive frequency range in Hz
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FrequencyBand {
    /// Lowest frequency in the band
    pub start_hz: u32,
    /// Highest frequency in the band
    pub end_hz: u32,
}

impl FrequencyBand {
    /// Create a band
    #[must_use]
    pub const fn new(start_hz: u32, end_hz: u32) -> Self {
        Self { start_hz, end_hz }
    }

    /// Check whether a frequency falls in the band
    #[must_use]
    pub const fn contains(&self, hz: u32) -> bool {
        hz >= self.start_hz && hz <= self.end_hz
    }
}

impl fmt::Debug for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrequencyBand({}..={} Hz)", self.start_hz, self.end_hz)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for FrequencyBand {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}..={} Hz", self.start_hz, self.end_hz);
    }
}

/// Antenna path selected by the RF switches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioPath {
    /// Disconnect all filters
    Isolate,
    /// 300-348 MHz filter
    Path315,
    /// 387-464 MHz filter
    Path433,
    /// 779-928 MHz filter
    Path868,
}

impl RadioPath {
    /// Get path name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Isolate => "isolate",
            Self::Path315 => "315",
            Self::Path433 => "433",
            Self::Path868 => "868",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for RadioPath {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.as_str());
    }
}

/// Hardware region, decides where transmission is permitted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Region {
    /// Europe and Russia
    EuRu,
    /// United States, Canada, Australia
    UsCaAu,
    /// Japan
    Jp,
    /// Unprovisioned device, no restriction
    #[default]
    Unknown,
}

impl Region {
    /// Get region name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EuRu => "EuRu",
            Self::UsCaAu => "UsCaAu",
            Self::Jp => "Jp",
            Self::Unknown => "Unknown",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Region {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.as_str());
    }
}
