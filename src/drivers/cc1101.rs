//! CC1101 Sub-GHz Transceiver Driver
//!
//! Register-level access over an [`SpiDevice`]. Every transfer's first
//! returned byte is the chip status byte; single-register helpers return it
//! as [`ChipStatus`].
//!
//! The chip runs off a 26 MHz crystal. Frequencies are programmed as a
//! 24-bit word `FREQ = f * 2^16 / f_xtal`.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Operation, SpiBus, SpiDevice};
use embedded_hal_bus::spi::ExclusiveDevice;

use crate::config::CC1101_XTAL_HZ;
use crate::radio::control::Transceiver;

/// Configuration register addresses
#[allow(missing_docs)]
pub mod reg {
    pub const IOCFG2: u8 = 0x00;
    pub const IOCFG1: u8 = 0x01;
    pub const IOCFG0: u8 = 0x02;
    pub const FIFOTHR: u8 = 0x03;
    pub const PKTCTRL0: u8 = 0x08;
    pub const FSCTRL1: u8 = 0x0B;
    pub const FREQ2: u8 = 0x0D;
    pub const FREQ1: u8 = 0x0E;
    pub const FREQ0: u8 = 0x0F;
    pub const MDMCFG4: u8 = 0x10;
    pub const MDMCFG3: u8 = 0x11;
    pub const MDMCFG2: u8 = 0x12;
    pub const MDMCFG1: u8 = 0x13;
    pub const MDMCFG0: u8 = 0x14;
    pub const MCSM0: u8 = 0x18;
    pub const FOCCFG: u8 = 0x19;
    pub const AGCCTRL2: u8 = 0x1B;
    pub const AGCCTRL1: u8 = 0x1C;
    pub const WORCTRL: u8 = 0x20;
    pub const FREND1: u8 = 0x21;
    pub const FREND0: u8 = 0x22;
    pub const FSCAL3: u8 = 0x23;
    pub const FSCAL2: u8 = 0x24;
    pub const FSCAL1: u8 = 0x25;
    pub const FSCAL0: u8 = 0x26;
    pub const TEST2: u8 = 0x2C;
    pub const TEST1: u8 = 0x2D;
    pub const TEST0: u8 = 0x2E;
    pub const PATABLE: u8 = 0x3E;
    pub const FIFO: u8 = 0x3F;
}

/// Command strobes
#[allow(missing_docs)]
pub mod strobe {
    pub const SRES: u8 = 0x30;
    pub const SCAL: u8 = 0x33;
    pub const SRX: u8 = 0x34;
    pub const STX: u8 = 0x35;
    pub const SIDLE: u8 = 0x36;
    pub const SPWD: u8 = 0x39;
    pub const SFRX: u8 = 0x3A;
    pub const SFTX: u8 = 0x3B;
    pub const SNOP: u8 = 0x3D;
}

/// Read-only status registers (accessed with the burst bit set)
#[allow(missing_docs)]
pub mod status {
    pub const PARTNUM: u8 = 0x30;
    pub const VERSION: u8 = 0x31;
    pub const LQI: u8 = 0x33;
    pub const RSSI: u8 = 0x34;
    pub const MARCSTATE: u8 = 0x35;
}

/// GDOx pin configuration values
pub mod iocfg {
    /// Hardware-controlled: async serial data / carrier sense
    pub const HW: u8 = 0x2F;
    /// Invert the pin output
    pub const INV: u8 = 0x40;
    /// Tri-state the pin
    pub const HIGH_IMPEDANCE: u8 = 0x2E;
}

/// Header bit: read access
const READ: u8 = 0x80;
/// Header bit: burst access
const BURST: u8 = 0x40;

/// Main radio control state from the status byte
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChipState {
    /// Idle
    Idle,
    /// Receiving
    Rx,
    /// Transmitting
    Tx,
    /// Synthesizer on, ready to transmit
    FsTxOn,
    /// Synthesizer calibrating
    Calibrate,
    /// PLL settling
    Settling,
    /// RX FIFO overflowed
    RxFifoOverflow,
    /// TX FIFO underflowed
    TxFifoUnderflow,
}

impl ChipState {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Idle,
            1 => Self::Rx,
            2 => Self::Tx,
            3 => Self::FsTxOn,
            4 => Self::Calibrate,
            5 => Self::Settling,
            6 => Self::RxFifoOverflow,
            _ => Self::TxFifoUnderflow,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ChipState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Idle => defmt::write!(f, "IDLE"),
            Self::Rx => defmt::write!(f, "RX"),
            Self::Tx => defmt::write!(f, "TX"),
            Self::FsTxOn => defmt::write!(f, "FSTXON"),
            Self::Calibrate => defmt::write!(f, "CALIBRATE"),
            Self::Settling => defmt::write!(f, "SETTLING"),
            Self::RxFifoOverflow => defmt::write!(f, "RXFIFO_OVERFLOW"),
            Self::TxFifoUnderflow => defmt::write!(f, "TXFIFO_UNDERFLOW"),
        }
    }
}

/// Status byte returned on every header transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipStatus(u8);

impl ChipStatus {
    /// Wrap a raw status byte
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw status byte
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Crystal running and chip ready (CHIP_RDYn low)
    #[must_use]
    pub const fn is_ready(self) -> bool {
        self.0 & 0x80 == 0
    }

    /// Main state machine state
    #[must_use]
    pub const fn state(self) -> ChipState {
        ChipState::from_bits(self.0 >> 4)
    }

    /// Free bytes in the TX FIFO (or available in RX FIFO on reads)
    #[must_use]
    pub const fn fifo_bytes(self) -> u8 {
        self.0 & 0x0F
    }
}

/// FREQ register word for a frequency
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn frequency_word(hz: u32) -> u32 {
    (((hz as u64) << 16) / CC1101_XTAL_HZ as u64) as u32
}

/// Frequency a FREQ register word produces
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn word_frequency(word: u32) -> u32 {
    ((word as u64 * CC1101_XTAL_HZ as u64) >> 16) as u32
}

/// CC1101 driver
pub struct Cc1101<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Cc1101<SPI> {
    /// Create a driver on a chip-selected SPI device
    #[must_use]
    pub const fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Give back the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }

    /// Issue a command strobe
    pub fn strobe(&mut self, command: u8) -> Result<ChipStatus, SPI::Error> {
        let mut buf = [command];
        self.spi.transfer_in_place(&mut buf)?;
        Ok(ChipStatus(buf[0]))
    }

    /// Write one configuration register
    pub fn write_reg(&mut self, addr: u8, value: u8) -> Result<ChipStatus, SPI::Error> {
        let mut buf = [addr, value];
        self.spi.transfer_in_place(&mut buf)?;
        Ok(ChipStatus(buf[0]))
    }

    /// Read one configuration register
    pub fn read_reg(&mut self, addr: u8) -> Result<u8, SPI::Error> {
        let mut buf = [addr | READ, 0];
        self.spi.transfer_in_place(&mut buf)?;
        Ok(buf[1])
    }

    /// Read one status register
    pub fn read_status(&mut self, addr: u8) -> Result<u8, SPI::Error> {
        let mut buf = [addr | READ | BURST, 0];
        self.spi.transfer_in_place(&mut buf)?;
        Ok(buf[1])
    }

    /// Write consecutive registers starting at `addr`
    pub fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), SPI::Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[addr | BURST]), Operation::Write(data)])
    }

    /// Current status without side effects
    pub fn status(&mut self) -> Result<ChipStatus, SPI::Error> {
        self.strobe(strobe::SNOP)
    }

    /// Main radio control state machine state (MARCSTATE)
    pub fn marc_state(&mut self) -> Result<u8, SPI::Error> {
        Ok(self.read_status(status::MARCSTATE)? & 0x1F)
    }

    /// Program the synthesizer, returning the frequency actually set
    pub fn set_frequency(&mut self, hz: u32) -> Result<u32, SPI::Error> {
        let word = frequency_word(hz);
        let [_, f2, f1, f0] = word.to_be_bytes();
        self.write_reg(reg::FREQ2, f2)?;
        self.write_reg(reg::FREQ1, f1)?;
        self.write_reg(reg::FREQ0, f0)?;
        Ok(word_frequency(word))
    }

    /// Load the 8-entry PA power table
    pub fn set_pa_table(&mut self, table: &[u8; 8]) -> Result<(), SPI::Error> {
        self.write_burst(reg::PATABLE, table)
    }
}

impl<BUS: SpiBus, CS: OutputPin, D: DelayNs> Cc1101<ExclusiveDevice<BUS, CS, D>> {
    /// Create a driver owning the whole bus, with `cs` as chip select
    ///
    /// # Errors
    ///
    /// If the chip select cannot be driven to its inactive (high) level.
    pub fn on_bus(bus: BUS, cs: CS, delay: D) -> Result<Self, CS::Error> {
        ExclusiveDevice::new(bus, cs, delay).map(Self::new)
    }
}

impl<SPI: SpiDevice> Transceiver for Cc1101<SPI> {
    type Error = SPI::Error;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.strobe(strobe::SRES).map(drop)
    }

    fn shutdown(&mut self) -> Result<(), Self::Error> {
        self.strobe(strobe::SPWD).map(drop)
    }

    fn idle(&mut self) -> Result<(), Self::Error> {
        self.strobe(strobe::SIDLE).map(drop)
    }

    fn rx(&mut self) -> Result<(), Self::Error> {
        self.strobe(strobe::SRX).map(drop)
    }

    fn tx(&mut self) -> Result<(), Self::Error> {
        self.strobe(strobe::STX).map(drop)
    }

    fn calibrate(&mut self) -> Result<(), Self::Error> {
        self.strobe(strobe::SCAL).map(drop)
    }

    fn flush_rx(&mut self) -> Result<(), Self::Error> {
        self.strobe(strobe::SFRX).map(drop)
    }

    fn flush_tx(&mut self) -> Result<(), Self::Error> {
        self.strobe(strobe::SFTX).map(drop)
    }

    fn is_idle(&mut self) -> Result<bool, Self::Error> {
        Ok(self.status()?.state() == ChipState::Idle)
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        self.write_reg(addr, value).map(drop)
    }

    fn set_frequency(&mut self, hz: u32) -> Result<u32, Self::Error> {
        Cc1101::set_frequency(self, hz)
    }

    fn set_pa_table(&mut self, table: &[u8; 8]) -> Result<(), Self::Error> {
        Cc1101::set_pa_table(self, table)
    }

    fn rssi_raw(&mut self) -> Result<u8, Self::Error> {
        self.read_status(status::RSSI)
    }

    fn lqi_raw(&mut self) -> Result<u8, Self::Error> {
        self.read_status(status::LQI)
    }

    fn part_number(&mut self) -> Result<u8, Self::Error> {
        self.read_status(status::PARTNUM)
    }

    fn version(&mut self) -> Result<u8, Self::Error> {
        self.read_status(status::VERSION)
    }
}
