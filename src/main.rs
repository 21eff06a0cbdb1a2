//! Sub-GHz / Infrared Signal Firmware Main Application
//!
//! Entry point for the STM32WB55 firmware. Brings up the CC1101 front end,
//! then alternates between sending an infrared frame through the TX engine
//! and logging what the RX engine captures.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use defmt::{error, info, warn, Debug2Format};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use subghz_firmware::drivers::cc1101::Cc1101;
use subghz_firmware::hal::gpio::RfSwitchPin;
use subghz_firmware::hal::tim_dma::{take_capture_events, take_tx_events, CarrierTimer, CaptureTimer};
use subghz_firmware::hal::timer::SpinDelay;
use subghz_firmware::prelude::*;

/// Infrared port: TIM1 carrier on PB9, TIM2 capture on PA0
static IR_PORT: SignalPort<'static, CarrierTimer, CaptureTimer> =
    SignalPort::new(CarrierTimer::new(), CaptureTimer::new(), CarrierLimits::INFRARED);

/// Received pulses, drained by the main task
static EDGES: Channel<CriticalSectionRawMutex, Pulse, 64> = Channel::new();

/// Silence after the last edge
static SILENCE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

static FRAMES_SENT: AtomicU32 = AtomicU32::new(0);

static FRAME: StaticCell<FrameSource> = StaticCell::new();
static FRAME_SENT: StaticCell<FrameCounter> = StaticCell::new();
static EDGE_LOG: StaticCell<EdgeLog> = StaticCell::new();
static SILENCE_LOG: StaticCell<SilenceLog> = StaticCell::new();

/// IR carrier (38 kHz, one third duty)
const IR_CARRIER_HZ: u32 = 38_000;
const IR_DUTY: f32 = 0.33;

/// RX silence that ends a capture, in microseconds
const RX_SILENCE_US: u32 = 150_000;

/// NEC frame for address 0x00, command 0x45, one mark then one space per entry
const NEC_FRAME: [(u32, u32); 34] = nec_frame(0x00, 0x45);

const fn nec_frame(address: u8, command: u8) -> [(u32, u32); 34] {
    let mut frame = [(560, 560); 34];
    frame[0] = (9_000, 4_500);
    let word = u32::from_le_bytes([address, !address, command, !command]);
    let mut bit = 0;
    while bit < 32 {
        if word & (1 << bit) != 0 {
            frame[bit + 1] = (560, 1_690);
        }
        bit += 1;
    }
    frame
}

/// Plays [`NEC_FRAME`] and rewinds, so every session sends one frame
struct FrameSource {
    index: usize,
}

impl TxSource for FrameSource {
    fn next_sample(&mut self) -> TxData {
        let (mark, space) = NEC_FRAME[self.index / 2];
        let is_mark = self.index % 2 == 0;
        self.index += 1;
        if is_mark {
            TxData::Ok(Pulse::mark(mark))
        } else if self.index == NEC_FRAME.len() * 2 {
            self.index = 0;
            TxData::LastDone(Pulse::space(space))
        } else {
            TxData::Ok(Pulse::space(space))
        }
    }
}

struct FrameCounter;

impl SignalSent for FrameCounter {
    fn signal_sent(&mut self) {
        FRAMES_SENT.fetch_add(1, Ordering::Relaxed);
    }
}

struct EdgeLog;

impl CaptureSink for EdgeLog {
    fn capture(&mut self, level: bool, duration_us: u32) {
        // dropped edges only shorten the log
        let _ = EDGES.try_send(Pulse::new(level, duration_us));
    }
}

struct SilenceLog;

impl TimeoutSink for SilenceLog {
    fn timeout(&mut self) {
        SILENCE.signal(());
    }
}

#[interrupt]
fn TIM1_UP_TIM16() {
    let (polarity, period) = take_tx_events();
    IR_PORT.on_polarity_dma_irq(polarity);
    IR_PORT.on_period_dma_irq(period);
}

#[interrupt]
fn TIM2() {
    IR_PORT.on_capture_irq(take_capture_events());
}

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("SubGHz firmware v{}", env!("CARGO_PKG_VERSION"));

    // HSE 32 MHz, PLL to 64 MHz
    let mut config = embassy_stm32::Config::default();
    config.rcc = embassy_stm32::rcc::WPAN_DEFAULT;
    let p = embassy_stm32::init(config);

    info!("Peripherals initialized");

    // CC1101 on SPI2: PD1 = SCK, PB15 = MOSI, PC2 = MISO, PD0 = CS
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(8_000_000);
    let spi = Spi::new_blocking(p.SPI2, p.PD1, p.PB15, p.PC2, spi_config);
    let cs = Output::new(p.PD0, Level::High, Speed::VeryHigh);
    let Ok(chip) = Cc1101::on_bus(spi, cs, SpinDelay) else {
        defmt::panic!("CC1101 chip select could not be driven high");
    };
    let switch = RfSwitchPin::new(Output::new(p.PC4, Level::Low, Speed::Low));

    let mut radio = SubGhzRadio::new(chip, switch, Region::EuRu);
    match bring_up(&mut radio) {
        Ok(hz) => info!("CC1101 ready on {} Hz, path {}", hz, radio.path()),
        Err(e) => error!("CC1101 bring-up failed: {}", Debug2Format(&e)),
    }

    IR_PORT.set_tx_data_callback(FRAME.init(FrameSource { index: 0 }));
    IR_PORT.set_tx_signal_sent_callback(FRAME_SENT.init(FrameCounter));
    IR_PORT.set_rx_capture_callback(EDGE_LOG.init(EdgeLog));
    IR_PORT.set_rx_timeout_callback(SILENCE_LOG.init(SilenceLog));

    interrupt::TIM1_UP_TIM16.set_priority(Priority::from(dma::UPDATE_IRQ_PRIORITY << 4));
    interrupt::TIM2.set_priority(Priority::from(timers::CAPTURE_IRQ_PRIORITY << 4));
    // SAFETY: both handlers only touch IR_PORT, which is interrupt-safe
    unsafe {
        interrupt::TIM1_UP_TIM16.enable();
        interrupt::TIM2.enable();
    }

    info!("Signal engines ready, entering main loop");

    loop {
        IR_PORT.start_async_tx(IR_CARRIER_HZ, IR_DUTY);
        IR_PORT.wait_tx_termination().await;
        let stats = IR_PORT.last_tx_stats();
        info!(
            "frame {} sent, duty {}%",
            FRAMES_SENT.load(Ordering::Relaxed),
            stats.duty_percent()
        );

        IR_PORT.start_async_rx();
        IR_PORT.set_rx_timeout(RX_SILENCE_US);
        SILENCE.reset();
        let mut edges = 0u32;
        loop {
            match select(EDGES.receive(), SILENCE.wait()).await {
                Either::First(pulse) => {
                    edges += 1;
                    info!("rx {}", pulse);
                }
                Either::Second(()) => break,
            }
        }
        IR_PORT.stop_async_rx();
        if edges == 0 {
            warn!("no IR activity");
        } else {
            info!("rx burst of {} edges", edges);
        }
    }
}

/// Reset the front end and tune it for OOK at the default frequency
fn bring_up<T: Transceiver, S: RfSwitch>(
    radio: &mut SubGhzRadio<T, S>,
) -> Result<u32, RadioError<T::Error>> {
    radio.init()?;
    let (part, version) = radio.dump_state()?;
    info!("CC1101 part {} version {}", part, version);
    radio.load_preset(Preset::OokAsync)?;
    let hz = radio.set_frequency_and_path(DEFAULT_FREQUENCY_HZ)?;
    radio.idle()?;
    Ok(hz)
}
