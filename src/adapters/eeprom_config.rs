//! EEPROM-backed config store.
//!
//! Implements [`ConfigPort`] on top of any [`StoragePort`]. The record
//! lives in the top page of the device, above the host's user region:
//!
//! ```text
//! 0x0F00 ┌──────────┬──────────┬──────────────────────────┐
//!        │ 0xC5     │ len (1B) │ postcard(ReflowConfig)   │
//!        └──────────┴──────────┴──────────────────────────┘
//! ```
//!
//! Config validation: every field is range-checked before persistence and
//! after loading. An erased device (0xFF) reads as `NotFound`.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StoragePort};
use crate::config::ReflowConfig;
use crate::drivers::eeprom::USER_REGION_END;

/// Marks a written config record.
pub const RECORD_MAGIC: u8 = 0xC5;
/// First byte of the config record.
pub const CONFIG_REGION_START: u16 = USER_REGION_END;
/// Largest serialized config that fits the region with its header.
const MAX_RECORD: usize = 254;

pub struct EepromConfigStore<'a, S: StoragePort> {
    storage: &'a mut S,
}

impl<'a, S: StoragePort> EepromConfigStore<'a, S> {
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    /// Load the stored config, or fall back to defaults and write them
    /// back when the record is missing or unusable.
    pub fn load_or_default(&mut self) -> ReflowConfig {
        match self.load() {
            Ok(cfg) => {
                info!("Config loaded from EEPROM");
                cfg
            }
            Err(ConfigError::Storage(e)) => {
                warn!("Config read failed ({}), using defaults", e);
                ReflowConfig::default()
            }
            Err(e) => {
                warn!("Stored config unusable ({}), restoring defaults", e);
                let defaults = ReflowConfig::default();
                if let Err(e) = self.save(&defaults) {
                    warn!("Could not persist defaults: {}", e);
                }
                defaults
            }
        }
    }
}

impl<S: StoragePort> ConfigPort for EepromConfigStore<'_, S> {
    fn load(&mut self) -> Result<ReflowConfig, ConfigError> {
        let mut header = [0u8; 2];
        self.storage.read(CONFIG_REGION_START, &mut header)?;
        let [magic, len] = header;
        if magic != RECORD_MAGIC {
            return Err(ConfigError::NotFound);
        }
        let len = len as usize;
        if len == 0 || len > MAX_RECORD {
            return Err(ConfigError::Corrupted);
        }

        let mut buf = [0u8; MAX_RECORD];
        self.storage.read(CONFIG_REGION_START + 2, &mut buf[..len])?;
        let cfg: ReflowConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn save(&mut self, config: &ReflowConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let mut buf = [0u8; MAX_RECORD];
        let used = postcard::to_slice(config, &mut buf)
            .map_err(|_| ConfigError::TooLarge)?
            .len();

        // Body first, header last: a torn write leaves no valid magic.
        self.storage.write(CONFIG_REGION_START + 2, &buf[..used])?;
        self.storage
            .write(CONFIG_REGION_START, &[RECORD_MAGIC, used as u8])?;
        info!("Config saved to EEPROM ({} bytes)", used);
        Ok(())
    }
}
