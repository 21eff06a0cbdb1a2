//! System configuration and hardware constants
//!
//! Compile-time constants for the signal engines and the sub-GHz front end.
//! Pin, DMA and timer assignments for the STM32WB55 board live in the
//! sub-modules so the HAL layer and the docs agree on one table.

use crate::types::FrequencyBand;

/// System clock frequency (STM32WB55 @ 64MHz)
pub const SYSTEM_CLOCK_HZ: u32 = 64_000_000;

/// Playback entries per ping/pong buffer
pub const TX_BUFFER_ENTRIES: usize = 200;

/// Space-level entries placed ahead of the first buffer's polarity stream
///
/// The polarity stream runs one timer update ahead of the period stream, so
/// the first word it writes must be a space.
pub const TX_POLARITY_PRE_ROLL: usize = 1;

/// Capacity of one polarity stream
pub const TX_POLARITY_ENTRIES: usize = TX_BUFFER_ENTRIES + TX_POLARITY_PRE_ROLL;

/// Largest value a single playback entry can hold (16-bit repetition counter)
pub const TX_MAX_TICKS: u16 = 0xFFFF;

/// Entries in the stop flush buffer
pub const TX_FLUSH_ENTRIES: usize = 2;

/// Capture timer prescaler: 64 MHz / 64 = 1 tick per microsecond
pub const RX_CAPTURE_PRESCALER: u16 = 64;

/// Capture timer auto-reload (free running)
pub const RX_CAPTURE_AUTO_RELOAD: u32 = 0x7FFF_FFFE;

/// Infrared carrier range
pub const INFRARED_CARRIER_MIN_HZ: u32 = 10_000;

/// Infrared carrier range
pub const INFRARED_CARRIER_MAX_HZ: u32 = 56_000;

/// Frequency bands the CC1101 front end supports, one per antenna path
pub const SUBGHZ_BANDS: [FrequencyBand; 3] = [
    FrequencyBand::new(299_999_755, 348_000_335),
    FrequencyBand::new(386_999_938, 464_000_000),
    FrequencyBand::new(778_999_847, 928_000_000),
];

/// Infrared carrier band
pub const INFRARED_BANDS: [FrequencyBand; 1] =
    [FrequencyBand::new(INFRARED_CARRIER_MIN_HZ, INFRARED_CARRIER_MAX_HZ)];

/// CC1101 crystal frequency (26 MHz)
pub const CC1101_XTAL_HZ: u32 = 26_000_000;

/// Status polls allowed while waiting for calibration to finish
pub const CALIBRATION_POLL_LIMIT: u32 = 10_000;

/// Default startup frequency (433.92 MHz)
pub const DEFAULT_FREQUENCY_HZ: u32 = 433_920_000;

/// Timer CCMR2 words written by the polarity stream
pub mod ccmr {
    /// Output compare 3 preload enable
    pub const OC3PE: u8 = 0x08;
    /// OC3M = PWM mode 2
    pub const OC3M_PWM2: u8 = 0x70;
    /// OC3M = forced inactive
    pub const OC3M_FORCED_INACTIVE: u8 = 0x40;

    /// Carrier on
    pub const MARK: u8 = OC3PE | OC3M_PWM2;
    /// Carrier off
    pub const SPACE: u8 = OC3PE | OC3M_FORCED_INACTIVE;
}

/// GPIO pin assignments
pub mod pins {
    /// Infrared LED output (TIM1_CH3N, AF1)
    pub const IR_TX: &str = "PB9";
    /// Infrared demodulator input (TIM2_CH1, AF1)
    pub const IR_RX: &str = "PA0";
    /// CC1101 GDO0, async data in/out (TIM2_CH2)
    pub const CC1101_GDO0: &str = "PA1";
    /// CC1101 SPI chip select
    pub const CC1101_CS: &str = "PD0";
    /// CC1101 SPI clock
    pub const CC1101_SCK: &str = "PD1";
    /// CC1101 SPI MOSI
    pub const CC1101_MOSI: &str = "PB15";
    /// CC1101 SPI MISO
    pub const CC1101_MISO: &str = "PC2";
    /// RF switch 0: low selects the 433 filter, high the 315/868 pair
    pub const RF_SW_0: &str = "PC4";
}

/// DMA channel assignments
pub mod dma {
    /// Polarity stream (memory -> TIM1 CCMR2), very high priority
    pub const POLARITY_CHANNEL: usize = 0;
    /// Period stream (memory -> TIM1 RCR), medium priority
    pub const PERIOD_CHANNEL: usize = 1;
    /// DMAMUX request: TIM1 update
    pub const TIM1_UP_REQUEST: u8 = 23;
    /// NVIC priority of the TIM1 update interrupt that services both streams
    pub const UPDATE_IRQ_PRIORITY: u8 = 4;
}

/// Timer assignments
pub mod timers {
    /// Carrier timer: TIM1, output on CH3N
    pub const CARRIER_CHANNEL: usize = 2;
    /// Capture timer: TIM2, rising edge on CH1, falling edge on CH2
    pub const CAPTURE_RISING_CHANNEL: usize = 0;
    /// Capture timer falling edge channel
    pub const CAPTURE_FALLING_CHANNEL: usize = 1;
    /// Capture timer silence timeout compare channel
    pub const CAPTURE_TIMEOUT_CHANNEL: usize = 2;
    /// Capture interrupt priority
    pub const CAPTURE_IRQ_PRIORITY: u8 = 5;
}
