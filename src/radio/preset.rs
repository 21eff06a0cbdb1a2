//! CC1101 register presets
//!
//! A register table is a flat byte list of `(address, value)` pairs closed
//! by a `(0, 0)` terminator. A custom preset is such a table immediately
//! followed by an 8-byte PA table.

use crate::drivers::cc1101::reg;

/// Register table terminated by `(0, 0)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterTable<'a> {
    bytes: &'a [u8],
}

impl<'a> RegisterTable<'a> {
    /// Wrap a terminated byte list
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Iterate the pairs before the terminator
    ///
    /// A trailing odd byte or a missing terminator ends iteration at the
    /// last complete pair.
    pub fn pairs(&self) -> impl Iterator<Item = (u8, u8)> + 'a {
        self.bytes
            .chunks_exact(2)
            .map(|p| (p[0], p[1]))
            .take_while(|&(addr, _)| addr != 0)
    }

    /// Bytes consumed by the pairs and the terminator
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.pairs().count() * 2 + 2
    }
}

/// Preset selector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Preset {
    /// Chip asleep, no registers loaded
    #[default]
    Idle,
    /// On-off keying, asynchronous serial data on GDO0
    OokAsync,
    /// Loaded from a user-supplied table
    Custom,
}

impl Preset {
    /// Get preset name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::OokAsync => "ook-async",
            Self::Custom => "custom",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Preset {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.as_str());
    }
}

/// OOK, 650 kHz bandwidth, asynchronous serial mode
#[rustfmt::skip]
pub const OOK_ASYNC_REGS: &[u8] = &[
    // GDO0 carries the async serial data
    reg::IOCFG0, 0x0D,
    reg::FIFOTHR, 0x47,
    // async serial, infinite packet length
    reg::PKTCTRL0, 0x32,
    reg::FSCTRL1, 0x06,
    reg::MDMCFG0, 0x00,
    reg::MDMCFG1, 0x00,
    // ASK/OOK, no preamble or sync
    reg::MDMCFG2, 0x30,
    reg::MDMCFG3, 0x32,
    reg::MDMCFG4, 0x67,
    reg::MCSM0, 0x18,
    reg::FOCCFG, 0x18,
    reg::AGCCTRL1, 0x00,
    reg::AGCCTRL2, 0x07,
    reg::WORCTRL, 0xFB,
    // PA table index 1 drives the mark
    reg::FREND0, 0x11,
    reg::FREND1, 0xB6,
    reg::FSCAL3, 0xE9,
    reg::FSCAL2, 0x2A,
    reg::FSCAL1, 0x00,
    reg::FSCAL0, 0x1F,
    reg::TEST2, 0x81,
    reg::TEST1, 0x35,
    reg::TEST0, 0x09,
    0, 0,
];

/// PA table for OOK: index 0 off, index 1 about +10 dBm
pub const OOK_ASYNC_PATABLE: [u8; 8] = [0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Split a custom preset into its register table and PA table
///
/// Returns `None` when the bytes after the terminator are fewer than eight.
#[must_use]
pub fn parse_custom(data: &[u8]) -> Option<(RegisterTable<'_>, [u8; 8])> {
    let table = RegisterTable::new(data);
    let start = table.encoded_len();
    let pa = data.get(start..start + 8)?;
    let mut patable = [0u8; 8];
    patable.copy_from_slice(pa);
    Some((table, patable))
}
