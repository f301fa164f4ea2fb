//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements         | Connects to                 |
//! |-----------------|--------------------|-----------------------------|
//! | `eeprom_config` | ConfigPort         | AT24C32 top page            |
//! | `hardware`      | ThermocouplePort   | MAX6675 over SPI            |
//! |                 | HeaterPort         | SSR GPIO                    |
//! | `log_sink`      | EventSink          | Serial log output           |
//! | `time`          | (clock)            | ESP32 system timer          |
//! | `uart`          | Transport          | ESP-IDF UART driver         |

pub mod eeprom_config;
pub mod hardware;
pub mod log_sink;
pub mod time;
#[cfg(feature = "espidf")]
pub mod uart;
