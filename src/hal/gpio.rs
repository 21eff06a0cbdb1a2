//! GPIO Abstractions
//!
//! Type-safe wrappers giving board pins their radio meaning.

use embassy_stm32::gpio::Output;

use crate::radio::RfSwitch;

/// Antenna switch select line SW0
///
/// Together with the CC1101 GDO2 output it selects one of the three band
/// filters or isolates the antenna.
pub struct RfSwitchPin<'d> {
    pin: Output<'d>,
}

impl<'d> RfSwitchPin<'d> {
    /// Wrap the SW0 output (drive it low first)
    #[must_use]
    pub fn new(mut pin: Output<'d>) -> Self {
        pin.set_low();
        Self { pin }
    }
}

impl RfSwitch for RfSwitchPin<'_> {
    fn set_sw0(&mut self, high: bool) {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}
