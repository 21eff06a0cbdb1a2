//! Sub-GHz radio control surface
//!
//! Synchronous tuning, antenna path selection, presets and the regulatory
//! TX lockout, layered over a [`Transceiver`] and an [`RfSwitch`].

use thiserror_no_std::Error;

use super::preset::{parse_custom, Preset, RegisterTable, OOK_ASYNC_PATABLE, OOK_ASYNC_REGS};
use super::region::is_tx_allowed;
use crate::config::{CALIBRATION_POLL_LIMIT, SUBGHZ_BANDS};
use crate::drivers::cc1101::{iocfg, reg};
use crate::types::{RadioPath, Region};

/// Register-level radio chip operations the control surface needs
pub trait Transceiver {
    /// Bus or chip error
    type Error: core::fmt::Debug;

    /// Software reset
    fn reset(&mut self) -> Result<(), Self::Error>;
    /// Enter power-down
    fn shutdown(&mut self) -> Result<(), Self::Error>;
    /// Enter idle
    fn idle(&mut self) -> Result<(), Self::Error>;
    /// Enter receive
    fn rx(&mut self) -> Result<(), Self::Error>;
    /// Enter transmit
    fn tx(&mut self) -> Result<(), Self::Error>;
    /// Start synthesizer calibration
    fn calibrate(&mut self) -> Result<(), Self::Error>;
    /// Drop RX FIFO contents
    fn flush_rx(&mut self) -> Result<(), Self::Error>;
    /// Drop TX FIFO contents
    fn flush_tx(&mut self) -> Result<(), Self::Error>;
    /// Chip reports the idle state
    fn is_idle(&mut self) -> Result<bool, Self::Error>;
    /// Write one configuration register
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error>;
    /// Program the synthesizer, returning the frequency actually set
    fn set_frequency(&mut self, hz: u32) -> Result<u32, Self::Error>;
    /// Load the PA power table
    fn set_pa_table(&mut self, table: &[u8; 8]) -> Result<(), Self::Error>;
    /// Raw RSSI register
    fn rssi_raw(&mut self) -> Result<u8, Self::Error>;
    /// Raw LQI register
    fn lqi_raw(&mut self) -> Result<u8, Self::Error>;
    /// Chip part number
    fn part_number(&mut self) -> Result<u8, Self::Error>;
    /// Chip version
    fn version(&mut self) -> Result<u8, Self::Error>;
}

/// GPIO-driven antenna filter switch
pub trait RfSwitch {
    /// Drive RF switch 0
    fn set_sw0(&mut self, high: bool);
}

/// Recoverable radio errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RadioError<E: core::fmt::Debug> {
    /// SPI transfer or chip error
    #[error("radio bus error: {0:?}")]
    Bus(E),
    /// Chip did not return to idle after calibration
    #[error("calibration did not complete")]
    CalibrationTimeout,
}

impl<E: core::fmt::Debug> From<E> for RadioError<E> {
    fn from(err: E) -> Self {
        Self::Bus(err)
    }
}

/// Radio result type
pub type RadioResult<T, E> = Result<T, RadioError<E>>;

/// Whether transmission is permitted at the current frequency
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regulation {
    /// Transmit and receive
    TxRx,
    /// Receive only
    OnlyRx,
}

/// Check a frequency against the front end's three hardware bands
#[must_use]
pub fn is_frequency_valid(hz: u32) -> bool {
    SUBGHZ_BANDS.iter().any(|b| b.contains(hz))
}

/// Antenna path serving a frequency, `None` outside all hardware bands
#[must_use]
pub fn path_for_frequency(hz: u32) -> Option<RadioPath> {
    const PATHS: [RadioPath; 3] = [RadioPath::Path315, RadioPath::Path433, RadioPath::Path868];
    SUBGHZ_BANDS
        .iter()
        .zip(PATHS)
        .find_map(|(band, path)| band.contains(hz).then_some(path))
}

/// Convert a raw RSSI register value to dBm
#[must_use]
pub fn rssi_dbm(raw: u8) -> f32 {
    let value = f32::from(raw);
    if raw >= 128 {
        (value - 256.0) / 2.0 - 74.0
    } else {
        value / 2.0 - 74.0
    }
}

/// Sub-GHz radio
pub struct SubGhzRadio<T, S> {
    chip: T,
    switch: S,
    region: Region,
    regulation: Regulation,
    preset: Preset,
    path: Option<RadioPath>,
}

impl<T: Transceiver, S: RfSwitch> SubGhzRadio<T, S> {
    /// Wrap a chip and its RF switch
    #[must_use]
    pub const fn new(chip: T, switch: S, region: Region) -> Self {
        Self {
            chip,
            switch,
            region,
            regulation: Regulation::TxRx,
            preset: Preset::Idle,
            path: None,
        }
    }

    /// Hardware region in use
    #[must_use]
    pub const fn region(&self) -> Region {
        self.region
    }

    /// Current regulatory verdict
    #[must_use]
    pub const fn regulation(&self) -> Regulation {
        self.regulation
    }

    /// Last loaded preset
    #[must_use]
    pub const fn preset(&self) -> Preset {
        self.preset
    }

    /// Last selected antenna path
    #[must_use]
    pub const fn path(&self) -> Option<RadioPath> {
        self.path
    }

    /// Borrow the chip
    pub fn chip(&mut self) -> &mut T {
        &mut self.chip
    }

    /// Take the chip and switch back
    pub fn release(self) -> (T, S) {
        (self.chip, self.switch)
    }

    /// Reset the chip, park GDO pins and put it to sleep
    pub fn init(&mut self) -> RadioResult<(), T::Error> {
        self.chip.reset()?;
        self.chip.write_register(reg::IOCFG0, iocfg::HIGH_IMPEDANCE)?;
        self.switch.set_sw0(false);
        self.chip.write_register(reg::IOCFG2, iocfg::HW)?;
        self.chip.shutdown()?;
        self.preset = Preset::Idle;
        info!("subghz init ok");
        Ok(())
    }

    /// Idle, float GDO0 and power down
    pub fn sleep(&mut self) -> RadioResult<(), T::Error> {
        self.chip.idle()?;
        self.chip.write_register(reg::IOCFG0, iocfg::HIGH_IMPEDANCE)?;
        self.chip.shutdown()?;
        self.preset = Preset::Idle;
        Ok(())
    }

    /// Log chip identification
    pub fn dump_state(&mut self) -> RadioResult<(u8, u8), T::Error> {
        let part = self.chip.part_number()?;
        let version = self.chip.version()?;
        info!("cc1101 chip {}, version {}", part, version);
        Ok((part, version))
    }

    /// Load a built-in preset
    ///
    /// # Panics
    ///
    /// For [`Preset::Custom`], which needs its table: use
    /// [`Self::load_custom_preset`].
    pub fn load_preset(&mut self, preset: Preset) -> RadioResult<(), T::Error> {
        match preset {
            Preset::OokAsync => {
                self.load_registers(&RegisterTable::new(OOK_ASYNC_REGS))?;
                self.load_patable(&OOK_ASYNC_PATABLE)?;
            }
            Preset::Idle => self.sleep()?,
            Preset::Custom => panic!("load_preset: custom presets carry their own table"),
        }
        self.preset = preset;
        debug!("preset {}", preset.as_str());
        Ok(())
    }

    /// Load a user preset: register pairs, `(0, 0)`, then 8 PA table bytes
    ///
    /// # Panics
    ///
    /// If the PA table after the terminator is incomplete.
    pub fn load_custom_preset(&mut self, data: &[u8]) -> RadioResult<(), T::Error> {
        let Some((table, patable)) = parse_custom(data) else {
            panic!("load_custom_preset: PA table truncated");
        };
        self.load_registers(&table)?;
        self.load_patable(&patable)?;
        self.preset = Preset::Custom;
        debug!("custom preset, {} registers", table.pairs().count());
        Ok(())
    }

    /// Reset the chip and write a register table
    pub fn load_registers(&mut self, table: &RegisterTable<'_>) -> RadioResult<(), T::Error> {
        self.chip.reset()?;
        for (addr, value) in table.pairs() {
            self.chip.write_register(addr, value)?;
        }
        Ok(())
    }

    /// Write the PA power table
    pub fn load_patable(&mut self, table: &[u8; 8]) -> RadioResult<(), T::Error> {
        self.chip.set_pa_table(table)?;
        Ok(())
    }

    /// Drop RX FIFO contents
    pub fn flush_rx(&mut self) -> RadioResult<(), T::Error> {
        Ok(self.chip.flush_rx()?)
    }

    /// Drop TX FIFO contents
    pub fn flush_tx(&mut self) -> RadioResult<(), T::Error> {
        Ok(self.chip.flush_tx()?)
    }

    /// Power down without touching the GDO pins
    pub fn shutdown(&mut self) -> RadioResult<(), T::Error> {
        Ok(self.chip.shutdown()?)
    }

    /// Idle, reset and float GDO0
    pub fn reset(&mut self) -> RadioResult<(), T::Error> {
        self.chip.idle()?;
        self.chip.reset()?;
        self.chip.write_register(reg::IOCFG0, iocfg::HIGH_IMPEDANCE)?;
        Ok(())
    }

    /// Enter idle
    pub fn idle(&mut self) -> RadioResult<(), T::Error> {
        Ok(self.chip.idle()?)
    }

    /// Enter receive
    pub fn rx(&mut self) -> RadioResult<(), T::Error> {
        Ok(self.chip.rx()?)
    }

    /// Enter transmit if the current frequency permits it
    ///
    /// Returns `Ok(false)` without touching the chip when transmission is
    /// locked out.
    pub fn tx(&mut self) -> RadioResult<bool, T::Error> {
        if self.regulation != Regulation::TxRx {
            warn!("subghz tx refused: frequency not allowed in region {}", self.region.as_str());
            return Ok(false);
        }
        self.chip.tx()?;
        Ok(true)
    }

    /// Received signal strength in dBm
    pub fn rssi(&mut self) -> RadioResult<f32, T::Error> {
        Ok(rssi_dbm(self.chip.rssi_raw()?))
    }

    /// Link quality indicator
    pub fn lqi(&mut self) -> RadioResult<u8, T::Error> {
        Ok(self.chip.lqi_raw()? & 0x7F)
    }

    /// Tune and calibrate, returning the frequency actually set
    ///
    /// Also decides the regulatory verdict for the requested frequency.
    pub fn set_frequency(&mut self, hz: u32) -> RadioResult<u32, T::Error> {
        self.regulation = if is_tx_allowed(self.region, hz) {
            Regulation::TxRx
        } else {
            Regulation::OnlyRx
        };

        let real = self.chip.set_frequency(hz)?;
        self.chip.calibrate()?;
        self.wait_idle()?;
        debug!("frequency {} Hz requested, {} Hz set", hz, real);
        Ok(real)
    }

    /// Tune and select the antenna path for the resulting frequency
    ///
    /// # Panics
    ///
    /// If the tuned frequency lies outside every hardware band.
    pub fn set_frequency_and_path(&mut self, hz: u32) -> RadioResult<u32, T::Error> {
        let real = self.set_frequency(hz)?;
        let Some(path) = path_for_frequency(real) else {
            panic!("set_frequency_and_path: {real} Hz outside all hardware bands");
        };
        self.set_path(path)?;
        Ok(real)
    }

    /// Drive the RF switch and GDO2 inversion for `path`
    pub fn set_path(&mut self, path: RadioPath) -> RadioResult<(), T::Error> {
        let (sw0, gdo2) = match path {
            RadioPath::Path433 => (false, iocfg::HW | iocfg::INV),
            RadioPath::Path315 => (true, iocfg::HW),
            RadioPath::Path868 => (true, iocfg::HW | iocfg::INV),
            RadioPath::Isolate => (false, iocfg::HW),
        };
        self.switch.set_sw0(sw0);
        self.chip.write_register(reg::IOCFG2, gdo2)?;
        self.path = Some(path);
        debug!("path {}", path.as_str());
        Ok(())
    }

    fn wait_idle(&mut self) -> RadioResult<(), T::Error> {
        for _ in 0..CALIBRATION_POLL_LIMIT {
            if self.chip.is_idle()? {
                return Ok(());
            }
        }
        error!("subghz calibration timeout");
        Err(RadioError::CalibrationTimeout)
    }
}
