//! Regulatory transmit bands
//!
//! Which frequencies may be transmitted on depends only on the hardware
//! region. Receiving is always permitted.

use crate::types::{FrequencyBand, Region};

const EU_RU: &[FrequencyBand] = &[
    FrequencyBand::new(433_050_000, 434_790_000),
    FrequencyBand::new(868_150_000, 868_550_000),
];

const US_CA_AU: &[FrequencyBand] = &[
    FrequencyBand::new(304_100_000, 321_950_000),
    FrequencyBand::new(433_050_000, 434_790_000),
    FrequencyBand::new(915_000_000, 928_000_000),
];

const JP: &[FrequencyBand] = &[
    FrequencyBand::new(312_000_000, 315_250_000),
    FrequencyBand::new(920_500_000, 923_500_000),
];

/// Transmit bands of a region, `None` when unrestricted
#[must_use]
pub const fn tx_bands(region: Region) -> Option<&'static [FrequencyBand]> {
    match region {
        Region::EuRu => Some(EU_RU),
        Region::UsCaAu => Some(US_CA_AU),
        Region::Jp => Some(JP),
        Region::Unknown => None,
    }
}

/// May `hz` be transmitted on in `region`
#[must_use]
pub fn is_tx_allowed(region: Region, hz: u32) -> bool {
    tx_bands(region).map_or(true, |bands| bands.iter().any(|b| b.contains(hz)))
}
