//! Reflow Oven Controller: Main Entry Point
//!
//! Hexagonal architecture with a single cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  OvenHardware        LogEventSink   At24c32      UartTransport │
//! │  (Thermocouple+Heater)(EventSink)   (Storage)    (Transport)   │
//! │  EepromConfigStore   MonotonicClock                            │
//! │  (ConfigPort)        (ms clock)                                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │             ReflowService (pure logic)                 │    │
//! │  │  Control FSM · PID/Auto-tune · Safety · Protocol       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Board wiring:
//!
//! | Signal          | Peripheral | GPIO |
//! |-----------------|------------|------|
//! | Host TX         | UART1      | 17   |
//! | Host RX         | UART1      | 18   |
//! | MAX6675 SCK     | SPI2       | 12   |
//! | MAX6675 SO      | SPI2       | 13   |
//! | (unused MOSI)   | SPI2       | 11   |
//! | MAX6675 CS      | SPI2       | 10   |
//! | AT24C32 SDA     | I2C0       | 8    |
//! | AT24C32 SCL     | I2C0       | 9    |
//! | SSR drive       | GPIO       | 4    |

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use esp_idf_hal::delay::{Delay, FreeRtos};
use esp_idf_hal::gpio::{AnyIOPin, PinDriver};
use esp_idf_hal::i2c::{self, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::{self, SpiDeviceDriver, SpiDriver, SpiDriverConfig};
use esp_idf_hal::uart::{self, UartDriver};
use esp_idf_hal::units::Hertz;
use log::info;

use reflow::adapters::eeprom_config::EepromConfigStore;
use reflow::adapters::hardware::OvenHardware;
use reflow::adapters::log_sink::LogEventSink;
use reflow::adapters::time::MonotonicClock;
use reflow::adapters::uart::UartTransport;
use reflow::app::service::ReflowService;
use reflow::drivers::eeprom::At24c32;
use reflow::drivers::heater::DutyCycleDriver;
use reflow::error::{CommsError, Error};
use reflow::sensors::max6675::Max6675;

/// Address straps (A2..A0) on the EEPROM.
const EEPROM_STRAPS: u8 = 0b000;
const SPI_CLOCK_HZ: u32 = 1_000_000;
const I2C_CLOCK_HZ: u32 = 100_000;
/// Loop pacing. Well under the protocol's byte time at 9600 baud.
const LOOP_DELAY_MS: u32 = 1;

fn main() -> Result<()> {
    // ── 1. Platform init ──────────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Reflow Controller v{}            ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take().map_err(|_| Error::Init("peripherals already taken"))?;
    let pins = peripherals.pins;

    // ── 2. Storage and config ─────────────────────────────────
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        pins.gpio8,
        pins.gpio9,
        &i2c::config::Config::new().baudrate(Hertz(I2C_CLOCK_HZ)),
    )
    .map_err(|_| Error::Init("I2C bus"))?;
    let mut storage = At24c32::new(i2c, Delay::new_default(), EEPROM_STRAPS);
    let config = EepromConfigStore::new(&mut storage).load_or_default();
    info!(
        "Config: baud={} max={:.0}C gains=({:.3}, {:.4}, {:.3})",
        config.baud, config.max_temperature_c, config.gains.kp, config.gains.ki, config.gains.kd
    );

    // ── 3. Peripherals ────────────────────────────────────────
    let spi = SpiDriver::new(
        peripherals.spi2,
        pins.gpio12,
        pins.gpio11,
        Some(pins.gpio13),
        &SpiDriverConfig::new(),
    )
    .map_err(|_| Error::Init("SPI bus"))?;
    let spi = SpiDeviceDriver::new(
        spi,
        Some(pins.gpio10),
        &spi::config::Config::new().baudrate(Hertz(SPI_CLOCK_HZ)),
    )
    .map_err(|_| Error::Init("MAX6675 chip select"))?;
    let thermocouple = Max6675::new(spi);

    let ssr = PinDriver::output(pins.gpio4).map_err(|_| Error::Init("SSR pin"))?;
    let heater = DutyCycleDriver::new(ssr, config.cycle_period_ms);
    let mut hw = OvenHardware::new(thermocouple, heater);

    let uart = UartDriver::new(
        peripherals.uart1,
        pins.gpio17,
        pins.gpio18,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart::config::Config::default().baudrate(Hertz(config.baud)),
    )
    .map_err(|_| Error::Comms(CommsError::UartInitFailed))?;
    let mut transport = UartTransport::new(uart);

    // ── 4. Service ────────────────────────────────────────────
    let clock = MonotonicClock::new();
    let mut sink = LogEventSink::new();
    let mut service = ReflowService::new(config);
    service.start(&mut hw, &mut sink);

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        service.tick(
            clock.now_ms(),
            &mut hw,
            &mut transport,
            &mut storage,
            &mut sink,
        );
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}
