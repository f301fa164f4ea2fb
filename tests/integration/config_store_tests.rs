//! Config record persistence next to host user data.

use reflow::adapters::eeprom_config::{CONFIG_REGION_START, EepromConfigStore, RECORD_MAGIC};
use reflow::app::ports::{ConfigError, ConfigPort};
use reflow::config::{PidGains, ReflowConfig};
use reflow::drivers::eeprom::USER_REGION_END;

use crate::mock_hw::{MockEeprom, Rig, SimOven, set_data};

#[test]
fn first_boot_persists_defaults() {
    let mut eeprom = MockEeprom::new();
    let config = EepromConfigStore::new(&mut eeprom).load_or_default();
    assert_eq!(config, ReflowConfig::default());
    assert_eq!(eeprom.mem[CONFIG_REGION_START as usize], RECORD_MAGIC);
    assert!(eeprom.mem[..USER_REGION_END as usize].iter().all(|b| *b == 0xFF));
}

#[test]
fn stored_gains_survive_a_reboot() {
    let mut eeprom = MockEeprom::new();
    let config = ReflowConfig {
        gains: PidGains {
            kp: 12.5,
            ki: 0.2,
            kd: 40.0,
        },
        telemetry_interval_ms: 250,
        ..ReflowConfig::default()
    };
    EepromConfigStore::new(&mut eeprom).save(&config).unwrap();

    let loaded = EepromConfigStore::new(&mut eeprom).load_or_default();
    assert_eq!(loaded, config);

    let oven = SimOven::scripted(25.0, loaded.cycle_period_ms);
    let rig = Rig::new(loaded, oven);
    assert_eq!(rig.svc.engine().gains(), config.gains);
    assert!(matches!(
        rig.svc.protocol().stream().state(),
        reflow::rpc::stream::StreamState::Active { interval_ms: 250 }
    ));
}

#[test]
fn host_writes_cannot_reach_the_config_record() {
    let mut rig = Rig::scripted(25.0);
    EepromConfigStore::new(&mut rig.eeprom)
        .save(&ReflowConfig::default())
        .unwrap();
    let before = rig.eeprom.mem[CONFIG_REGION_START as usize..].to_vec();

    rig.exchange(&set_data(0x0EFD, &[0, 0, 0, 0]));
    rig.exchange(&set_data(CONFIG_REGION_START, &[0, 0, 0]));
    rig.exchange(&set_data(0x0100, &[9, 9, 9]));

    assert_eq!(&rig.eeprom.mem[CONFIG_REGION_START as usize..], before.as_slice());
    assert_eq!(
        EepromConfigStore::new(&mut rig.eeprom).load(),
        Ok(ReflowConfig::default())
    );
}

#[test]
fn corrupted_record_is_replaced() {
    let mut eeprom = MockEeprom::new();
    EepromConfigStore::new(&mut eeprom)
        .save(&ReflowConfig::default())
        .unwrap();
    // Tear the body but keep the header.
    eeprom.mem[CONFIG_REGION_START as usize + 2] = 0xFF;
    eeprom.mem[CONFIG_REGION_START as usize + 3] = 0xFF;
    eeprom.mem[CONFIG_REGION_START as usize + 4] = 0xFF;
    eeprom.mem[CONFIG_REGION_START as usize + 5] = 0xFF;
    eeprom.mem[CONFIG_REGION_START as usize + 6] = 0xFF;

    assert_eq!(
        EepromConfigStore::new(&mut eeprom).load(),
        Err(ConfigError::Corrupted)
    );
    let config = EepromConfigStore::new(&mut eeprom).load_or_default();
    assert_eq!(config, ReflowConfig::default());
    assert_eq!(EepromConfigStore::new(&mut eeprom).load(), Ok(config));
}
